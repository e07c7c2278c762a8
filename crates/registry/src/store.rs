//! The registry handle: one lock around the whole state, one flush per mutation.

use crate::credentials::User;
use crate::error::{ErrorKind, RegistryError, RegistryErrorExt, Result};
use crate::namespace::Grant;
use crate::package::Package;
use crate::path::PackagePath;
use crate::snapshot::Snapshot;
use crate::storer::{JsonStorer, MemoryStorer, Storer};
use crate::token::Token;
use chrono::Utc;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug)]
struct RegistryInner {
    state: RwLock<Snapshot>,
    storer: Box<dyn Storer>,
}

/// A thread-safe handle to the registry.
///
/// Reads take the shared lock. Every mutation takes the exclusive lock, applies the change
/// to a copy of the state, flushes that copy through the [`Storer`] and only then makes it
/// live. If the flush fails the live state is untouched and the caller gets a
/// persistence error.
///
/// The handle is reference-counted and cheap to clone. The state behind it is only
/// reachable through these methods:
///
/// ```compile_fail
/// let registry = vain_registry::Registry::in_memory();
/// let _ = registry.state.read();
/// ```
///
/// # Example
///
/// ```rust
/// use vain_registry::{Package, Registry, Vcs};
///
/// # fn main() -> vain_registry::Result<()> {
/// let registry = Registry::in_memory();
/// let token = registry.register_user("sm@example.org")?;
///
/// let pkg = Package::new(Vcs::Git, "https://git.example.org/sm/vain", "sm/vain")?;
/// registry.publish(&token, pkg)?;
///
/// let found = registry.get_package(&"sm/vain/cmd/vaind".try_into()?)?;
/// assert_eq!(found.repo(), "https://git.example.org/sm/vain");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Loads the last flushed snapshot from `storer` (an empty registry if there is none).
    ///
    /// # Errors
    ///
    /// Returns a persistence error when the snapshot cannot be read or violates an
    /// invariant.
    pub fn open(storer: impl Storer + 'static) -> Result<Self> {
        let snapshot = match storer.load().context("Loading snapshot")? {
            Some(snapshot) => {
                snapshot.check_invariants().context("Loading snapshot")?;
                snapshot
            },
            None => Snapshot::default(),
        };

        info!(
            packages = snapshot.packages().len(),
            users = snapshot.credentials().len(),
            namespaces = snapshot.namespaces().len(),
            storer = ?storer,
            "Registry loaded"
        );

        Ok(Self {
            inner: Arc::new(RegistryInner { state: RwLock::new(snapshot), storer: Box::new(storer) }),
        })
    }

    /// Opens a registry persisted as a JSON document at `path`.
    ///
    /// # Errors
    ///
    /// See [`JsonStorer::open`] and [`Registry::open`].
    pub fn open_json(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(JsonStorer::open(path)?)
    }

    /// Opens a registry persisted in an embedded database at `path`.
    ///
    /// # Errors
    ///
    /// See [`crate::RedbStorer::open`] and [`Registry::open`].
    #[cfg(feature = "redb")]
    pub fn open_redb(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::open(crate::storer::RedbStorer::open(path)?)
    }

    /// An empty registry that keeps its snapshots in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                state: RwLock::new(Snapshot::default()),
                storer: Box::new(MemoryStorer::new()),
            }),
        }
    }

    /// Registers `pkg` without any namespace check.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Conflict`] on overlap, [`ErrorKind::Persistence`] if the flush fails.
    #[instrument(skip_all, fields(path = %pkg.path()))]
    pub fn add_package(&self, pkg: Package) -> Result<()> {
        let vcs = pkg.vcs();
        self.mutate(|state| state.packages.add(pkg))?;
        info!(%vcs, "Package added");
        Ok(())
    }

    /// Removes the package registered at exactly `path`.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotFound`] when nothing sits at `path`, [`ErrorKind::Persistence`] if
    /// the flush fails.
    #[instrument(skip_all, fields(path = %path))]
    pub fn remove_package(&self, path: &PackagePath) -> Result<Package> {
        let removed = self.mutate(|state| state.packages.remove(path))?;
        info!("Package removed");
        Ok(removed)
    }

    /// Longest-prefix lookup.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotFound`] when no registered path covers `path`.
    pub fn get_package(&self, path: &PackagePath) -> Result<Package> {
        let found = self.inner.state.read().packages.get(path).cloned();
        debug!(path = %path, hit = found.is_ok(), "Package lookup");
        found
    }

    #[must_use]
    pub fn package_exists(&self, path: &PackagePath) -> bool {
        self.inner.state.read().packages.exists(path)
    }

    /// Every registered package, ordered by path.
    #[must_use]
    pub fn list_packages(&self) -> Vec<Package> {
        self.inner.state.read().packages.iter().cloned().collect()
    }

    /// Authorizes `token` for `namespace`, binding the namespace to the token's owner on
    /// first use.
    ///
    /// The common case (namespace already bound) is decided under the shared lock; only
    /// a first binding takes the exclusive lock and flushes.
    ///
    /// # Errors
    ///
    /// * [`ErrorKind::NotFound`] for an unknown token.
    /// * [`ErrorKind::Unauthorized`] when another user owns the namespace.
    /// * [`ErrorKind::Validation`] for an empty namespace.
    /// * [`ErrorKind::Persistence`] if the binding cannot be flushed.
    #[instrument(skip_all, fields(namespace = %namespace))]
    pub fn authorize_namespace(&self, namespace: &str, token: &Token) -> Result<Grant> {
        let decided = {
            let state = self.inner.state.read();
            let owner = state.credentials.owner_of(token)?;
            state.namespaces.check(namespace, owner)
        };

        let grant = match decided {
            Ok(Some(grant)) => Ok(grant),
            Ok(None) => self.mutate(|state| {
                let owner = state.credentials.owner_of(token)?.to_owned();
                state.namespaces.authorize(namespace, &owner)
            }),
            Err(err) => Err(err),
        };

        match &grant {
            Ok(Grant::Created) => info!("Namespace bound"),
            Ok(Grant::Existing) => debug!("Namespace authorized"),
            Err(err) if err.kind() == ErrorKind::Unauthorized => warn!("Namespace owned by another user"),
            Err(_) => {},
        }
        grant
    }

    /// Creates an unconfirmed user and returns the token to deliver for confirmation.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Validation`] for a malformed email, [`ErrorKind::Conflict`] when it is
    /// already registered, [`ErrorKind::Persistence`] if the flush fails.
    #[instrument(skip_all)]
    pub fn register_user(&self, email: &str) -> Result<Token> {
        let now = Utc::now();
        let token = self.mutate(|state| state.credentials.register(email, now))?;
        info!(email = %email.trim(), "User registered");
        Ok(token)
    }

    /// Exchanges a delivered token for a fresh live one; the presented token stops
    /// working immediately.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotFound`] for an unknown token, [`ErrorKind::Persistence`] if the
    /// flush fails.
    #[instrument(skip_all)]
    pub fn confirm_token(&self, token: &Token) -> Result<Token> {
        let fresh = self.mutate(|state| state.credentials.confirm(token))?;
        info!("Token confirmed");
        Ok(fresh)
    }

    /// Rotates the token of `email`, at most once per `window`.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotFound`] for an unknown email, [`ErrorKind::RateLimited`] (with the
    /// remaining wait) inside the window, [`ErrorKind::Persistence`] if the flush fails.
    #[instrument(skip_all, fields(email = %email.trim()))]
    pub fn request_token_reset(&self, email: &str, window: Duration) -> Result<Token> {
        let now = Utc::now();
        let fresh = self
            .mutate(|state| state.credentials.forgot(email, window, now))
            .inspect_err(|err| {
                if let Some(wait) = err.retry_after() {
                    warn!(retry_after_secs = wait.as_secs_f64(), "Token reset rate limited");
                }
            })?;
        info!("Token reset");
        Ok(fresh)
    }

    /// Authorizes the package's namespace for `token`, then adds the package.
    ///
    /// A namespace bound by the authorization stays bound even if the add is rejected.
    ///
    /// # Errors
    ///
    /// Any error of [`Registry::authorize_namespace`] or [`Registry::add_package`].
    pub fn publish(&self, token: &Token, pkg: Package) -> Result<()> {
        self.authorize_namespace(pkg.namespace(), token)?;
        self.add_package(pkg)
    }

    /// Removes the package at exactly `path` after authorizing `token` for the namespace
    /// it was registered under.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotFound`] when nothing sits at `path` (checked first), then any error
    /// of [`Registry::authorize_namespace`] or [`Registry::remove_package`].
    pub fn unpublish(&self, token: &Token, path: &PackagePath) -> Result<Package> {
        let namespace = {
            let state = self.inner.state.read();
            if !state.packages.exists(path) {
                return Err(RegistryError::not_found(format!("package {path}")));
            }
            state.packages.get(path)?.namespace().to_owned()
        };
        self.authorize_namespace(&namespace, token)?;
        self.remove_package(path)
    }

    /// Namespaces bound to the owner of `token`.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotFound`] for an unknown token.
    pub fn namespaces_owned_by(&self, token: &Token) -> Result<Vec<String>> {
        let state = self.inner.state.read();
        let owner = state.credentials.owner_of(token)?;
        Ok(state.namespaces.owned_by(owner).map(str::to_owned).collect())
    }

    #[must_use]
    pub fn user(&self, email: &str) -> Option<User> {
        self.inner.state.read().credentials.user(email).cloned()
    }

    /// A copy of the complete live state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.read().clone()
    }

    /// Flushes the live state as is; used for the final flush on shutdown.
    ///
    /// # Errors
    ///
    /// Any persistence error of the configured [`Storer`].
    pub fn flush(&self) -> Result<()> {
        let state = self.inner.state.read();
        self.inner.storer.flush(&state).context("Flushing snapshot")?;
        debug!("Registry flushed");
        Ok(())
    }

    fn mutate<T>(&self, op: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        let mut live = self.inner.state.write();
        let mut working = live.clone();
        let out = op(&mut working)?;
        self.inner.storer.flush(&working).context("Flushing snapshot")?;
        *live = working;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Vcs;

    fn path(raw: &str) -> PackagePath {
        PackagePath::parse(raw).unwrap()
    }

    fn pkg(raw: &str) -> Package {
        Package::new(Vcs::Git, format!("https://git.example.org/{raw}"), raw).unwrap()
    }

    #[test]
    fn test_mutations_reach_the_storer() {
        let storer = MemoryStorer::new();
        let registry = Registry::open(storer.clone()).unwrap();
        registry.add_package(pkg("a/b")).unwrap();

        let flushed = storer.last().unwrap();
        assert!(flushed.packages().exists(&path("a/b")));
    }

    #[test]
    fn test_reads_do_not_flush() {
        let storer = MemoryStorer::new();
        let registry = Registry::open(storer.clone()).unwrap();
        let _ = registry.get_package(&path("a/b"));
        let _ = registry.list_packages();
        assert!(storer.last().is_none());
    }

    #[test]
    fn test_authorize_is_idempotent_and_exclusive() {
        let registry = Registry::in_memory();
        let alice = registry.register_user("a@example.com").unwrap();
        let bob = registry.register_user("b@example.com").unwrap();

        assert_eq!(registry.authorize_namespace("a", &alice).unwrap(), Grant::Created);
        assert_eq!(registry.authorize_namespace("a", &alice).unwrap(), Grant::Existing);
        assert_eq!(registry.authorize_namespace("a", &bob).unwrap_err().kind(), ErrorKind::Unauthorized);

        let unknown = Token::new("0000-0000");
        assert_eq!(registry.authorize_namespace("a", &unknown).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(registry.authorize_namespace("", &alice).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_unpublish_checks_existence_then_ownership() {
        let registry = Registry::in_memory();
        let alice = registry.register_user("a@example.com").unwrap();
        let bob = registry.register_user("b@example.com").unwrap();
        registry.publish(&alice, pkg("a/foo")).unwrap();

        let err = registry.unpublish(&bob, &path("a/bar")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = registry.unpublish(&bob, &path("a/foo")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        registry.unpublish(&alice, &path("a/foo")).unwrap();
        assert!(registry.list_packages().is_empty());
    }

    #[test]
    fn test_owned_namespaces_follow_the_token() {
        let registry = Registry::in_memory();
        let first = registry.register_user("a@example.com").unwrap();
        registry.authorize_namespace("b", &first).unwrap();
        registry.authorize_namespace("a", &first).unwrap();

        let live = registry.confirm_token(&first).unwrap();
        assert_eq!(registry.namespaces_owned_by(&live).unwrap(), ["a", "b"]);
        assert_eq!(registry.namespaces_owned_by(&first).unwrap_err().kind(), ErrorKind::NotFound);
    }
}
