//! Segment-aware package paths.
//!
//! Paths are compared component-wise: `a/bc` is not a prefix of `a/b`, while `a/b` is a
//! prefix of `a/b/c`. Every path is normalized on construction so that map keys and
//! segment views always agree.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

const SEPARATOR: char = '/';

/// A normalized, non-empty `/`-delimited path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PackagePath(String);

impl PackagePath {
    /// Normalizes `raw`: leading, trailing and repeated separators are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Validation`] when nothing is left after normalization or
    /// when a segment is `.`/`..` or contains whitespace.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self> {
        let raw = raw.as_ref();
        let mut normalized = String::with_capacity(raw.len());

        for segment in raw.split(SEPARATOR).filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(RegistryError::validation(format!("relative segment in path {raw:?}")));
            }
            if segment.chars().any(char::is_whitespace) {
                return Err(RegistryError::validation(format!("whitespace in path {raw:?}")));
            }
            if !normalized.is_empty() {
                normalized.push(SEPARATOR);
            }
            normalized.push_str(segment);
        }

        if normalized.is_empty() {
            return Err(RegistryError::validation(format!("empty path {raw:?}")));
        }
        Ok(Self(normalized))
    }

    /// Joins a host and a route into one path (`host/route`).
    ///
    /// # Errors
    ///
    /// Same as [`PackagePath::parse`]; the route must not be empty.
    pub fn hosted(host: &str, route: &str) -> Result<Self> {
        let route = Self::parse(route)?;
        Self::parse(format!("{host}{SEPARATOR}{route}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// First segment; the unit of ownership when the path is a route.
    #[must_use]
    pub fn first_segment(&self) -> &str {
        self.0.split(SEPARATOR).next().unwrap_or(&self.0)
    }

    /// Every ancestor-or-self of this path, longest first (`a/b/c`, `a/b`, `a`).
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        let full = std::iter::once(self.0.as_str());
        let cut = self.0.rmatch_indices(SEPARATOR).map(|(idx, _)| &self.0[..idx]);
        full.chain(cut)
    }

    /// `true` when one path's segment sequence is a prefix of the other's (equality
    /// included). Two registered paths must never overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let (short, long) =
            if self.0.len() <= other.0.len() { (&self.0, &other.0) } else { (&other.0, &self.0) };
        long.strip_prefix(short.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(SEPARATOR))
    }

    /// Lower bound of the key range holding this path's descendants.
    pub(crate) fn descendant_floor(&self) -> String {
        format!("{}{SEPARATOR}", self.0)
    }
}

impl fmt::Display for PackagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackagePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for PackagePath {
    type Error = RegistryError;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl<'de> Deserialize<'de> for PackagePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Extracts the namespace (first non-empty segment) of a route such as `/sm/foo`.
///
/// # Errors
///
/// Returns [`RegistryError::Validation`] for the root route, which has no namespace.
pub fn parse_namespace(route: &str) -> Result<String> {
    route
        .split(SEPARATOR)
        .find(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| RegistryError::validation(format!("no namespace in route {route:?}")))
}
