//! Package records: a path bound to a repository and its version control system.

use crate::error::{RegistryError, Result};
use crate::path::PackagePath;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version control systems understood by the go tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vcs {
    #[default]
    Git,
    #[serde(alias = "mercurial")]
    Hg,
    Bzr,
    Svn,
}

impl Vcs {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Hg => "hg",
            Self::Bzr => "bzr",
            Self::Svn => "svn",
        }
    }
}

impl fmt::Display for Vcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vcs {
    type Err = RegistryError;

    fn from_str(label: &str) -> Result<Self> {
        match label {
            "git" => Ok(Self::Git),
            "hg" | "mercurial" => Ok(Self::Hg),
            "bzr" => Ok(Self::Bzr),
            "svn" => Ok(Self::Svn),
            other => Err(RegistryError::validation(format!("unsupported vcs {other:?}"))),
        }
    }
}

/// A registered vanity path.
///
/// Packages are replaced, never edited: every field is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    vcs: Vcs,
    repo: String,
    path: PackagePath,
    namespace: String,
}

impl Package {
    /// Builds a package whose namespace is the first segment of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Validation`] for an empty path or repository.
    pub fn new(vcs: Vcs, repo: impl Into<String>, path: impl AsRef<str>) -> Result<Self> {
        let path = PackagePath::parse(path)?;
        let namespace = path.first_segment().to_owned();
        Self::assemble(vcs, repo.into(), path, namespace)
    }

    /// Builds a package served from `host`: the stored path is `host/route` and the
    /// namespace is the first segment of `route`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Validation`] for an empty route or repository.
    pub fn hosted(vcs: Vcs, repo: impl Into<String>, host: &str, route: &str) -> Result<Self> {
        let namespace = crate::path::parse_namespace(route)?;
        let path = PackagePath::hosted(host, route)?;
        Self::assemble(vcs, repo.into(), path, namespace)
    }

    fn assemble(vcs: Vcs, repo: String, path: PackagePath, namespace: String) -> Result<Self> {
        let repo = repo.trim().to_owned();
        if repo.is_empty() {
            return Err(RegistryError::validation(format!("invalid repository for {path}")));
        }
        Ok(Self { vcs, repo, path, namespace })
    }

    #[must_use]
    pub const fn vcs(&self) -> Vcs {
        self.vcs
    }

    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    #[must_use]
    pub const fn path(&self) -> &PackagePath {
        &self.path
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// Renders the `go-import` meta tag the go tool looks for.
impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#"<meta name="go-import" content="{} {} {}">"#, self.path, self.vcs, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_meta_tag() {
        let p = Package::new(Vcs::Git, "https://s.mcquay.me/sm/bps", "mcquay.me/bps").unwrap();
        assert_eq!(
            p.to_string(),
            r#"<meta name="go-import" content="mcquay.me/bps git https://s.mcquay.me/sm/bps">"#
        );
    }

    #[test]
    fn test_vcs_labels() {
        for (label, want) in [("git", Vcs::Git), ("hg", Vcs::Hg), ("mercurial", Vcs::Hg), ("bzr", Vcs::Bzr), ("svn", Vcs::Svn)] {
            assert_eq!(label.parse::<Vcs>().unwrap(), want);
        }
        for label in ["", "bazar", "cvs"] {
            assert!(label.parse::<Vcs>().is_err(), "{label:?}");
        }
    }

    #[test]
    fn test_vcs_json_accepts_aliases() {
        let vcs: Vcs = serde_json::from_str(r#""mercurial""#).unwrap();
        assert_eq!(vcs, Vcs::Hg);
        assert_eq!(serde_json::to_string(&Vcs::Bzr).unwrap(), r#""bzr""#);
    }

    #[test]
    fn test_namespace_derivation() {
        let local = Package::new(Vcs::Git, "https://x", "a/foo").unwrap();
        assert_eq!(local.namespace(), "a");

        let hosted = Package::hosted(Vcs::Hg, "https://x", "example.org", "/sm/vain").unwrap();
        assert_eq!(hosted.path().as_str(), "example.org/sm/vain");
        assert_eq!(hosted.namespace(), "sm");
    }

    #[test]
    fn test_empty_repo_is_rejected() {
        assert!(Package::new(Vcs::Git, "  ", "a/foo").is_err());
    }
}
