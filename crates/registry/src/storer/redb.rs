use super::Storer;
use crate::credentials::{CredentialStore, User};
use crate::error::{RegistryError, RegistryErrorExt, Result};
use crate::namespace::NamespaceTable;
use crate::package::Package;
use crate::paths::PathRegistry;
use crate::snapshot::Snapshot;
use crate::token::Token;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

const PACKAGES: TableDefinition<&str, &str> = TableDefinition::new("packages");
const USERS: TableDefinition<&str, &str> = TableDefinition::new("users");
const TOKENS: TableDefinition<&str, &str> = TableDefinition::new("tokens");
const NAMESPACES: TableDefinition<&str, &str> = TableDefinition::new("namespaces");

const TABLES: [TableDefinition<&str, &str>; 4] = [PACKAGES, USERS, TOKENS, NAMESPACES];

/// Stores the snapshot in an embedded `redb` database, one table per map.
///
/// Package and user records are JSON-encoded values; the token index and namespace
/// bindings are plain strings. A flush clears and refills every table inside a single
/// write transaction.
pub struct RedbStorer {
    db: Database,
}

impl RedbStorer {
    /// Opens (or creates) the database file at `path` and makes sure every table exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RegistryError::Database`] if the file cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create database directory {}", parent.display()))?;
        }

        let db = Database::create(path)
            .map_err(redb::Error::from)
            .context(format!("Opening {}", path.display()))?;

        // Tables are created up front so a first read on a fresh file succeeds.
        let txn = db.begin_write().map_err(redb::Error::from)?;
        for table in TABLES {
            txn.open_table(table).map_err(redb::Error::from)?;
        }
        txn.commit().map_err(redb::Error::from)?;

        Ok(Self { db })
    }
}

impl std::fmt::Debug for RedbStorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStorer").finish_non_exhaustive()
    }
}

impl Storer for RedbStorer {
    fn load(&self) -> Result<Option<Snapshot>> {
        let txn = self.db.begin_read().map_err(redb::Error::from)?;

        let mut packages = Vec::new();
        let table = txn.open_table(PACKAGES).map_err(redb::Error::from)?;
        for row in table.iter().map_err(redb::Error::from)? {
            let (key, value) = row.map_err(redb::Error::from)?;
            let pkg: Package = serde_json::from_str(value.value())
                .context(format!("Decoding package {}", key.value()))?;
            if key.value() != pkg.path().as_str() {
                return Err(RegistryError::corrupted(format!(
                    "package {} stored under {}",
                    pkg.path(),
                    key.value()
                )));
            }
            packages.push(pkg);
        }

        let mut users = BTreeMap::new();
        let table = txn.open_table(USERS).map_err(redb::Error::from)?;
        for row in table.iter().map_err(redb::Error::from)? {
            let (key, value) = row.map_err(redb::Error::from)?;
            let user: User = serde_json::from_str(value.value())
                .context(format!("Decoding user {}", key.value()))?;
            users.insert(key.value().to_owned(), user);
        }

        let tokens: BTreeMap<Token, String> = read_pairs(&txn, TOKENS)?
            .into_iter()
            .map(|(token, email)| (Token::new(token), email))
            .collect();
        let namespaces: NamespaceTable = read_pairs(&txn, NAMESPACES)?.into_iter().collect();

        if packages.is_empty() && users.is_empty() && tokens.is_empty() && namespaces.is_empty() {
            debug!("Database holds no snapshot");
            return Ok(None);
        }

        Ok(Some(Snapshot::new(
            packages.into_iter().collect::<PathRegistry>(),
            CredentialStore::from_parts(users, tokens),
            namespaces,
        )))
    }

    fn flush(&self, snapshot: &Snapshot) -> Result<()> {
        let txn = self.db.begin_write().map_err(redb::Error::from)?;
        for table in TABLES {
            txn.delete_table(table).map_err(redb::Error::from)?;
        }
        {
            let mut table = txn.open_table(PACKAGES).map_err(redb::Error::from)?;
            for pkg in snapshot.packages().iter() {
                let value = serde_json::to_string(pkg).context("Encoding package")?;
                table.insert(pkg.path().as_str(), value.as_str()).map_err(redb::Error::from)?;
            }
        }
        {
            let mut table = txn.open_table(USERS).map_err(redb::Error::from)?;
            for user in snapshot.credentials().users() {
                let value = serde_json::to_string(user).context("Encoding user")?;
                table.insert(user.email.as_str(), value.as_str()).map_err(redb::Error::from)?;
            }
        }
        {
            let mut table = txn.open_table(TOKENS).map_err(redb::Error::from)?;
            for (token, email) in snapshot.credentials().tokens() {
                table.insert(token.as_str(), email).map_err(redb::Error::from)?;
            }
        }
        {
            let mut table = txn.open_table(NAMESPACES).map_err(redb::Error::from)?;
            for (namespace, owner) in snapshot.namespaces().iter() {
                table.insert(namespace, owner).map_err(redb::Error::from)?;
            }
        }
        txn.commit().map_err(redb::Error::from).context("Committing snapshot")?;

        debug!(packages = snapshot.packages().len(), "Snapshot committed");
        Ok(())
    }
}

fn read_pairs(
    txn: &redb::ReadTransaction,
    definition: TableDefinition<&str, &str>,
) -> Result<Vec<(String, String)>> {
    let table = txn.open_table(definition).map_err(redb::Error::from)?;
    let mut pairs = Vec::new();
    for row in table.iter().map_err(redb::Error::from)? {
        let (key, value) = row.map_err(redb::Error::from)?;
        pairs.push((key.value().to_owned(), value.value().to_owned()));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_loads_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        let storer = RedbStorer::open(tmp.path().join("vain.redb")).unwrap();
        assert!(storer.load().unwrap().is_none());
    }

    #[test]
    fn test_flush_replaces_previous_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let storer = RedbStorer::open(tmp.path().join("vain.redb")).unwrap();

        let full = Snapshot::new(
            [Package::new(crate::Vcs::Git, "https://x", "sm/a").unwrap()].into_iter().collect(),
            CredentialStore::default(),
            NamespaceTable::default(),
        );
        storer.flush(&full).unwrap();
        assert_eq!(storer.load().unwrap(), Some(full));

        storer.flush(&Snapshot::default()).unwrap();
        assert!(storer.load().unwrap().is_none());
    }

    #[test]
    fn test_package_row_under_foreign_key_is_corruption() {
        let tmp = tempfile::tempdir().unwrap();
        let storer = RedbStorer::open(tmp.path().join("vain.redb")).unwrap();

        let txn = storer.db.begin_write().unwrap();
        {
            let mut table = txn.open_table(PACKAGES).unwrap();
            let git = r#"{"vcs":"git","repo":"https://x/b","path":"sm/b","namespace":"sm"}"#;
            let hg = r#"{"vcs":"hg","repo":"https://x/b","path":"sm/b","namespace":"sm"}"#;
            table.insert("sm/a", git).unwrap();
            table.insert("zz/other", hg).unwrap();
        }
        txn.commit().unwrap();

        let err = storer.load().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Persistence);
        assert!(err.to_string().contains("stored under sm/a"), "{err}");
    }
}
