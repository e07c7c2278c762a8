//! The complete registry state, as flushed and loaded by a [`crate::Storer`].

use crate::credentials::CredentialStore;
use crate::error::{RegistryError, Result};
use crate::namespace::NamespaceTable;
use crate::paths::PathRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Packages, users, the token index and namespace bindings in one document.
///
/// Serialized as `{ "packages": {..}, "users": {..}, "tokens": {..}, "namespaces": {..} }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub(crate) packages: PathRegistry,
    #[serde(flatten)]
    pub(crate) credentials: CredentialStore,
    #[serde(default)]
    pub(crate) namespaces: NamespaceTable,
}

impl Snapshot {
    #[must_use]
    pub const fn new(
        packages: PathRegistry,
        credentials: CredentialStore,
        namespaces: NamespaceTable,
    ) -> Self {
        Self { packages, credentials, namespaces }
    }

    #[must_use]
    pub const fn packages(&self) -> &PathRegistry {
        &self.packages
    }

    #[must_use]
    pub const fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    #[must_use]
    pub const fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    /// Verifies every cross-map invariant of a loaded snapshot:
    ///
    /// - each package is stored under its own path;
    /// - each package's namespace is its route's first segment (the path's first segment,
    ///   or the one after the host);
    /// - no registered path is a segment prefix of another;
    /// - the token index matches the users;
    /// - every namespace is bound to an existing user.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Corrupted`] describing the first violation.
    pub fn check_invariants(&self) -> Result<()> {
        for (key, pkg) in self.packages.keys().zip(self.packages.iter()) {
            if key != pkg.path().as_str() {
                return Err(RegistryError::corrupted(format!(
                    "package {} stored under {key}",
                    pkg.path()
                )));
            }
        }

        for pkg in self.packages.iter() {
            let namespace = pkg.namespace();
            let owns_path = !namespace.is_empty()
                && pkg.path().segments().take(2).any(|segment| segment == namespace);
            if !owns_path {
                return Err(RegistryError::corrupted(format!(
                    "package {} claims namespace {namespace:?}",
                    pkg.path()
                )));
            }
        }

        let keys: BTreeSet<&str> = self.packages.keys().collect();
        for pkg in self.packages.iter() {
            if let Some(ancestor) = pkg.path().prefixes().skip(1).find(|p| keys.contains(p)) {
                return Err(RegistryError::corrupted(format!(
                    "path {} overlaps {ancestor}",
                    pkg.path()
                )));
            }
        }

        self.credentials.check()?;

        for (namespace, owner) in self.namespaces.iter() {
            if self.credentials.user(owner).is_none() {
                return Err(RegistryError::corrupted(format!(
                    "namespace {namespace:?} bound to unknown user {owner:?}"
                )));
            }
        }
        Ok(())
    }
}
