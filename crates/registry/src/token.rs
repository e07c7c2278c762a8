//! Opaque bearer credentials.

use getrandom::fill;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of random bytes behind every token (128 bits of entropy).
const TOKEN_BYTES: usize = 16;
/// Hex characters per hyphen-separated group.
const GROUP_LEN: usize = 4;

/// A bearer credential identifying one user.
///
/// Tokens are rendered as lowercase hex in groups of four (`a1b2-c3d4-...`). The `Debug`
/// output is redacted so tokens never leak through structured logs.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Wraps a token received from a client. No format checks are applied; unknown
    /// tokens are rejected by lookup, not by shape.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Generates a fresh credential from the operating system CSPRNG.
///
/// # Panics
///
/// Panics if the system RNG is unavailable; issuing predictable credentials is never an
/// acceptable fallback.
#[must_use]
pub fn fresh_token() -> Token {
    let mut bytes = [0u8; TOKEN_BYTES];
    fill(&mut bytes).expect("System RNG unavailable for token generation");

    let hex = hex::encode(bytes);
    let mut grouped = String::with_capacity(hex.len() + hex.len() / GROUP_LEN);
    for (i, ch) in hex.chars().enumerate() {
        if i > 0 && i % GROUP_LEN == 0 {
            grouped.push('-');
        }
        grouped.push(ch);
    }
    Token(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_shape_is_grouped_hex() {
        let token = fresh_token();
        let groups: Vec<&str> = token.as_str().split('-').collect();
        assert_eq!(groups.len(), TOKEN_BYTES * 2 / GROUP_LEN);
        for group in groups {
            assert_eq!(group.len(), GROUP_LEN);
            assert!(group.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_tokens_do_not_repeat() {
        let seen: HashSet<Token> = (0..1_000).map(|_| fresh_token()).collect();
        assert_eq!(seen.len(), 1_000);
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = Token::new("abcd-ef01");
        assert_eq!(format!("{token:?}"), "Token(<redacted>)");
        assert_eq!(token.to_string(), "abcd-ef01");
    }
}
