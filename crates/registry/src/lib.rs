//! A conflict-free registry of vanity import paths.
//!
//! The registry maps `/`-delimited paths to repository metadata and answers the go tool's
//! `go-import` lookups. Three rules hold at all times:
//!
//! - **No overlaps**: no registered path is a segment prefix of another (`a/b` blocks both
//!   `a` and `a/b/c`, but not `a/bc`).
//! - **Owned namespaces**: the first segment of a route belongs to the first user who
//!   publishes under it; everyone else is turned away.
//! - **Flush before acknowledge**: every mutation is durably written through a [`Storer`]
//!   before it returns, and a failed write leaves the live state untouched.
//!
//! # Architectural Overview
//!
//! 1.  **[`Registry`]**: the thread-safe handle exposing every operation.
//! 2.  **[`PathRegistry`]**, **[`CredentialStore`]**, **[`NamespaceTable`]**: the three maps
//!     of a [`Snapshot`], each enforcing its own invariants.
//! 3.  **[`Storer`]**: persistence backends ([`JsonStorer`], [`MemoryStorer`] and, with the
//!     `redb` feature, [`RedbStorer`]).
//!
//! # Examples
//!
//! ```rust
//! use vain_registry::{ErrorKind, Package, Registry, Vcs};
//!
//! # fn main() -> vain_registry::Result<()> {
//! # let tmp = tempfile::tempdir().unwrap();
//! let registry = Registry::open_json(tmp.path().join("vain.json"))?;
//!
//! let token = registry.register_user("sm@example.org")?;
//! let token = registry.confirm_token(&token)?;
//!
//! let pkg = Package::hosted(Vcs::Git, "https://git.example.org/sm/vain", "example.org", "/sm/vain")?;
//! registry.publish(&token, pkg)?;
//!
//! // `example.org/sm` would swallow the registered path.
//! let wider = Package::hosted(Vcs::Git, "https://git.example.org/sm", "example.org", "/sm")?;
//! let err = registry.publish(&token, wider).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::Conflict);
//! # Ok(())
//! # }
//! ```

mod credentials;
mod error;
mod namespace;
mod package;
mod path;
mod paths;
mod snapshot;
mod storer;
mod store;
mod token;

pub use credentials::{CredentialStore, User};
pub use error::{ErrorKind, RegistryError, RegistryErrorExt, Result};
pub use namespace::{Grant, NamespaceTable};
pub use package::{Package, Vcs};
pub use path::{PackagePath, parse_namespace};
pub use paths::PathRegistry;
pub use snapshot::Snapshot;
#[cfg(feature = "redb")]
pub use storer::RedbStorer;
pub use storer::{JsonStorer, MemoryStorer, Storer};
pub use store::Registry;
pub use token::{Token, fresh_token};
