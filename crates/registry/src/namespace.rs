//! Namespace bindings: the first path segment of a route, owned by exactly one email.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of a successful authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// The namespace was already bound to the caller.
    Existing,
    /// The namespace was unbound and is now bound to the caller.
    Created,
}

/// `namespace -> owner email`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceTable {
    owners: BTreeMap<String, String>,
}

impl NamespaceTable {
    /// Checks (and, for an unseen namespace, creates) the binding of `namespace` to `owner`.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::Validation`] for an empty namespace.
    /// * [`RegistryError::Unauthorized`] when another owner holds the namespace.
    pub fn authorize(&mut self, namespace: &str, owner: &str) -> Result<Grant> {
        match self.check(namespace, owner)? {
            Some(grant) => Ok(grant),
            None => {
                self.owners.insert(namespace.to_owned(), owner.to_owned());
                Ok(Grant::Created)
            }
        }
    }

    /// Read-only half of [`NamespaceTable::authorize`]: `Ok(None)` means the namespace is
    /// unbound and would be created.
    ///
    /// # Errors
    ///
    /// Same as [`NamespaceTable::authorize`].
    pub fn check(&self, namespace: &str, owner: &str) -> Result<Option<Grant>> {
        if namespace.is_empty() || namespace.contains('/') {
            return Err(RegistryError::validation(format!("invalid namespace {namespace:?}")));
        }
        match self.owners.get(namespace) {
            Some(bound) if bound == owner => Ok(Some(Grant::Existing)),
            Some(_) => Err(RegistryError::unauthorized(format!("namespace {namespace:?}"))),
            None => Ok(None),
        }
    }

    #[must_use]
    pub fn owner(&self, namespace: &str) -> Option<&str> {
        self.owners.get(namespace).map(String::as_str)
    }

    /// Namespaces bound to `owner`, in order.
    pub fn owned_by<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.owners
            .iter()
            .filter(move |(_, bound)| *bound == owner)
            .map(|(namespace, _)| namespace.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.owners.iter().map(|(n, o)| (n.as_str(), o.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

impl FromIterator<(String, String)> for NamespaceTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self { owners: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_first_writer_wins() {
        let mut table = NamespaceTable::default();
        assert_eq!(table.authorize("sm", "sm@example.org").unwrap(), Grant::Created);
        assert_eq!(table.authorize("sm", "sm@example.org").unwrap(), Grant::Existing);

        let err = table.authorize("sm", "other@example.org").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(table.owner("sm"), Some("sm@example.org"));
    }

    #[test]
    fn test_one_owner_many_namespaces() {
        let mut table = NamespaceTable::default();
        for ns in ["b", "a", "c"] {
            table.authorize(ns, "sm@example.org").unwrap();
        }
        table.authorize("z", "other@example.org").unwrap();

        let owned: Vec<&str> = table.owned_by("sm@example.org").collect();
        assert_eq!(owned, ["a", "b", "c"]);
    }

    #[test]
    fn test_empty_namespace_is_invalid() {
        let mut table = NamespaceTable::default();
        for ns in ["", "a/b"] {
            let err = table.authorize(ns, "sm@example.org").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert!(table.is_empty());
    }
}
