//! The path registry: registered packages keyed by path, free of overlaps.

use crate::error::{RegistryError, Result};
use crate::package::Package;
use crate::path::PackagePath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Registered packages, keyed by their normalized path.
///
/// Invariant: no key's segment sequence is a prefix of another key's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathRegistry {
    packages: BTreeMap<String, Package>,
}

impl PathRegistry {
    /// Inserts `pkg` unless its path overlaps a registered one.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Conflict`] naming the overlapping path; nothing is inserted.
    pub fn add(&mut self, pkg: Package) -> Result<()> {
        if let Some(taken) = self.overlapping(pkg.path()) {
            return Err(RegistryError::conflict(format!(
                "path {} overlaps registered path {taken}",
                pkg.path()
            )));
        }
        self.packages.insert(pkg.path().as_str().to_owned(), pkg);
        Ok(())
    }

    /// Removes the package registered at exactly `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when no package sits at `path`.
    pub fn remove(&mut self, path: &PackagePath) -> Result<Package> {
        self.packages
            .remove(path.as_str())
            .ok_or_else(|| RegistryError::not_found(format!("package {path}")))
    }

    /// Resolves `path` to the most specific registered package whose path is an
    /// ancestor-or-self of it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when no registered path covers `path`.
    pub fn get(&self, path: &PackagePath) -> Result<&Package> {
        path.prefixes()
            .find_map(|prefix| self.packages.get(prefix))
            .ok_or_else(|| RegistryError::not_found(format!("package {path}")))
    }

    #[must_use]
    pub fn exists(&self, path: &PackagePath) -> bool {
        self.packages.contains_key(path.as_str())
    }

    /// All packages, ordered by path.
    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// First registered path that overlaps `candidate`, if any.
    ///
    /// Ancestors (and equality) are found by probing each prefix; descendants live in the
    /// contiguous key range starting at `candidate/`.
    fn overlapping(&self, candidate: &PackagePath) -> Option<&str> {
        if let Some((ancestor, _)) = candidate.prefixes().find_map(|p| self.packages.get_key_value(p))
        {
            return Some(ancestor.as_str());
        }

        let floor = candidate.descendant_floor();
        self.packages
            .range::<str, _>((Bound::Included(floor.as_str()), Bound::Unbounded))
            .next()
            .map(|(key, _)| key.as_str())
            .filter(|key| key.starts_with(floor.as_str()))
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }
}

impl FromIterator<Package> for PathRegistry {
    /// Collects packages without overlap checks; used when loading persisted state, which
    /// is validated separately.
    fn from_iter<I: IntoIterator<Item = Package>>(iter: I) -> Self {
        let packages = iter.into_iter().map(|p| (p.path().as_str().to_owned(), p)).collect();
        Self { packages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::package::Vcs;

    fn pkg(path: &str) -> Package {
        Package::new(Vcs::Git, format!("https://example.com/{path}"), path).unwrap()
    }

    fn registry(paths: &[&str]) -> PathRegistry {
        let mut reg = PathRegistry::default();
        for p in paths {
            reg.add(pkg(p)).unwrap();
        }
        reg
    }

    #[test]
    fn test_rejects_every_overlap_shape() {
        let cases: [(&[&str], &str, bool); 9] = [
            (&[], "bobo", true),
            (&["bobo"], "bobo", false),
            (&["a/b/c"], "a/b/c", false),
            (&["a/b/c"], "a/b", false),
            (&["name/db", "name/lib"], "name/foo", true),
            (&["a"], "a/b", false),
            (&["foo"], "foo/bar", false),
            (&["foo/bar", "foo/baz"], "foo", false),
            (&["bilbo", "frodo"], "foo/bar/baz", true),
        ];

        for (existing, candidate, accepted) in cases {
            let mut reg = registry(existing);
            let before = reg.clone();
            let result = reg.add(pkg(candidate));
            assert_eq!(result.is_ok(), accepted, "{candidate} against {existing:?}");
            if !accepted {
                assert_eq!(result.unwrap_err().kind(), ErrorKind::Conflict);
                assert_eq!(reg, before, "rejected add must not mutate");
            }
        }
    }

    #[test]
    fn test_sibling_with_shared_string_prefix_is_allowed() {
        let mut reg = registry(&["a/b"]);
        reg.add(pkg("a/bc")).unwrap();
        reg.add(pkg("a/b-c")).unwrap();
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_longest_prefix_lookup() {
        let reg = registry(&["a/b", "a/c", "a/d/c", "a/d/e", "f/b/c/d", "f/b/c/e"]);
        let cases = [
            ("a/b", Some("a/b")),
            ("a/d/c", Some("a/d/c")),
            ("a/b/c", Some("a/b")),
            ("a/b/c/d", Some("a/b")),
            ("f/b/c/d/e/f/g", Some("f/b/c/d")),
            ("foo", None),
            ("a/d/f", None),
            ("a", None),
        ];
        for (query, want) in cases {
            let query = PackagePath::parse(query).unwrap();
            let got = reg.get(&query).ok().map(|p| p.path().as_str().to_owned());
            assert_eq!(got.as_deref(), want, "lookup {query}");
        }
    }

    #[test]
    fn test_remove_is_exact() {
        let mut reg = registry(&["a/b"]);
        let sub = PackagePath::parse("a/b/c").unwrap();
        assert_eq!(reg.remove(&sub).unwrap_err().kind(), ErrorKind::NotFound);

        let exact = PackagePath::parse("a/b").unwrap();
        assert_eq!(reg.remove(&exact).unwrap().path(), &exact);
        assert!(reg.is_empty());
    }
}
