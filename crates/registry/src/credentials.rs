//! The credential store: users keyed by email plus the `token -> email` reverse index.
//!
//! Every mutation updates both maps together; a token is live exactly when the reverse
//! index points at a user whose current token it is.

use crate::error::{RegistryError, Result};
use crate::token::{Token, fresh_token};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A credential holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub token: Token,
    pub registered: bool,
    /// Earliest instant at which another token reset may be requested.
    pub requested_until: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStore {
    #[serde(default)]
    users: BTreeMap<String, User>,
    #[serde(default)]
    tokens: BTreeMap<Token, String>,
}

impl CredentialStore {
    /// Creates an unconfirmed user and returns its first token.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::Validation`] for a malformed address.
    /// * [`RegistryError::Conflict`] when the email is already registered.
    pub fn register(&mut self, email: &str, now: DateTime<Utc>) -> Result<Token> {
        let email = normalize_email(email)?;
        if self.users.contains_key(&email) {
            return Err(RegistryError::conflict(format!("duplicate email {email:?}")));
        }

        let token = self.unused_token();
        self.tokens.insert(token.clone(), email.clone());
        self.users.insert(
            email.clone(),
            User { email, token: token.clone(), registered: false, requested_until: now },
        );
        Ok(token)
    }

    /// Exchanges a delivered token for a live one and marks the user registered.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for an unknown (or already superseded) token.
    pub fn confirm(&mut self, token: &Token) -> Result<Token> {
        let email = self.owner_of(token)?.to_owned();
        let fresh = self.rotate(&email)?;
        if let Some(user) = self.users.get_mut(&email) {
            user.registered = true;
        }
        Ok(fresh)
    }

    /// Issues a replacement token unless the previous request's cooldown is still running.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::NotFound`] when no user owns `email`.
    /// * [`RegistryError::RateLimited`] with the remaining wait while `now < requested_until`.
    /// * [`RegistryError::Validation`] when `window` cannot be represented as a timestamp offset.
    pub fn forgot(&mut self, email: &str, window: Duration, now: DateTime<Utc>) -> Result<Token> {
        let email = email.trim();
        let user = self
            .users
            .get(email)
            .ok_or_else(|| RegistryError::not_found(format!("email {email:?}")))?;

        if now < user.requested_until {
            let retry_after = (user.requested_until - now).to_std().unwrap_or_default();
            return Err(RegistryError::RateLimited {
                message: format!("reset for {email:?}").into(),
                retry_after,
                context: None,
            });
        }

        let until = TimeDelta::from_std(window)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or_else(|| RegistryError::validation(format!("reset window {window:?} too large")))?;

        let email = email.to_owned();
        let fresh = self.rotate(&email)?;
        if let Some(user) = self.users.get_mut(&email) {
            user.requested_until = until;
        }
        Ok(fresh)
    }

    /// Resolves a token to its owner's email.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown tokens.
    pub fn owner_of(&self, token: &Token) -> Result<&str> {
        self.tokens
            .get(token)
            .map(String::as_str)
            .ok_or_else(|| RegistryError::not_found("unknown token"))
    }

    #[must_use]
    pub fn user(&self, email: &str) -> Option<&User> {
        self.users.get(email.trim())
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Verifies that the forward map and the reverse index describe the same tokens.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Corrupted`] describing the first mismatch.
    pub fn check(&self) -> Result<()> {
        if self.tokens.len() != self.users.len() {
            return Err(RegistryError::corrupted(format!(
                "{} tokens indexed for {} users",
                self.tokens.len(),
                self.users.len()
            )));
        }
        for (key, user) in &self.users {
            if key != &user.email {
                return Err(RegistryError::corrupted(format!("user {key:?} stored as {:?}", user.email)));
            }
            if self.tokens.get(&user.token) != Some(key) {
                return Err(RegistryError::corrupted(format!("token of {key:?} is not indexed")));
            }
        }
        Ok(())
    }

    /// Replaces the user's token in both maps and returns the new one.
    fn rotate(&mut self, email: &str) -> Result<Token> {
        let fresh = self.unused_token();
        let user = self
            .users
            .get_mut(email)
            .ok_or_else(|| RegistryError::not_found(format!("email {email:?}")))?;

        let stale = std::mem::replace(&mut user.token, fresh.clone());
        self.tokens.remove(&stale);
        self.tokens.insert(fresh.clone(), email.to_owned());
        Ok(fresh)
    }

    fn unused_token(&self) -> Token {
        loop {
            let token = fresh_token();
            if !self.tokens.contains_key(&token) {
                return token;
            }
        }
    }

    pub(crate) fn from_parts(users: BTreeMap<String, User>, tokens: BTreeMap<Token, String>) -> Self {
        Self { users, tokens }
    }

    pub(crate) fn tokens(&self) -> impl Iterator<Item = (&Token, &str)> {
        self.tokens.iter().map(|(t, e)| (t, e.as_str()))
    }
}

fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim();
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && !domain.is_empty() && !domain.contains('@')
    }) && !email.chars().any(char::is_whitespace);

    if valid {
        Ok(email.to_owned())
    } else {
        Err(RegistryError::validation(format!("malformed email {raw:?}")))
    }
}
