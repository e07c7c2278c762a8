use super::Storer;
use crate::error::{RegistryError, RegistryErrorExt, Result};
use crate::snapshot::Snapshot;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

const TMP_MARKER: &str = ".vaintmp.";

/// Stores the snapshot as one pretty-printed JSON document.
///
/// Every flush writes a unique temporary sibling (`<file>.vaintmp.<pid>.<n>`), syncs it,
/// renames it over the target and syncs the parent directory, so readers only ever see a
/// complete snapshot. Temporaries orphaned by a crash are removed when the storer opens.
#[derive(Debug)]
pub struct JsonStorer {
    path: PathBuf,
    tmp_counter: AtomicU64,
}

impl JsonStorer {
    /// Prepares `path` for use: creates its parent directory and purges stale temporaries.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] when the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .context(format!("Failed to create snapshot directory {}", parent.display()))?;
        }

        let storer = Self { path, tmp_counter: AtomicU64::new(1) };
        storer.purge_tmp();
        Ok(storer)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unique_tmp_path(&self) -> PathBuf {
        let counter = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let file_name = self.path.file_name().and_then(|s| s.to_str()).unwrap_or("vain.json");
        self.path.with_file_name(format!("{file_name}{TMP_MARKER}{}.{counter}", std::process::id()))
    }

    fn purge_tmp(&self) {
        let Some(file_name) = self.path.file_name().and_then(|s| s.to_str()) else {
            return;
        };
        let prefix = format!("{file_name}{TMP_MARKER}");
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "Temp file scan failed");
                return;
            },
        };

        let mut removed = 0usize;
        for entry in entries.flatten() {
            let stale = entry.file_name().to_str().is_some_and(|name| name.starts_with(&prefix));
            if !stale || !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(err) => warn!(p = %entry.path().display(), error = %err, "Temp file removal failed"),
            }
        }
        if removed > 0 {
            info!(removed, "Cleaned up temporary snapshot files");
        }
    }

    fn swap_in(&self, temp: &Path) -> Result<()> {
        match fs::rename(temp, &self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                fs::remove_file(&self.path).context(format!(
                    "Failed to replace existing snapshot: {}",
                    self.path.display()
                ))?;
                fs::rename(temp, &self.path).context(format!(
                    "Atomic swap failed: {} -> {}",
                    temp.display(),
                    self.path.display()
                ))
            },
            Err(err) => Err(RegistryError::Io {
                source: err,
                context: Some(
                    format!("Atomic swap failed: {} -> {}", temp.display(), self.path.display())
                        .into(),
                ),
            }),
        }
    }

    fn sync_dir(path: &Path) {
        match fs::File::open(path) {
            Ok(dir) => {
                if let Err(err) = dir.sync_all() {
                    warn!(path = %path.display(), error = %err, "Directory sync failed");
                }
            },
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Directory open failed");
            },
        }
    }
}

impl Storer for JsonStorer {
    fn load(&self) -> Result<Option<Snapshot>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No snapshot on disk");
                return Ok(None);
            },
            Err(err) => {
                return Err(RegistryError::Io {
                    source: err,
                    context: Some(format!("Read failed: {}", self.path.display()).into()),
                });
            },
        };

        let snapshot = serde_json::from_slice(&data)
            .context(format!("Decoding {}", self.path.display()))?;
        Ok(Some(snapshot))
    }

    fn flush(&self, snapshot: &Snapshot) -> Result<()> {
        let data = serde_json::to_vec_pretty(snapshot).context("Encoding snapshot")?;
        let temp = self.unique_tmp_path();

        let written = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp)
            .context(format!("Temp creation failed: {}", temp.display()))
            .and_then(|mut file| {
                file.write_all(&data).context("Write failed")?;
                file.sync_all().context("Hardware sync failed")
            })
            .and_then(|()| self.swap_in(&temp));

        if written.is_err() {
            let _ = fs::remove_file(&temp);
        }
        written?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Self::sync_dir(parent);
        }

        debug!(path = %self.path.display(), bytes = data.len(), "Snapshot saved atomically");
        Ok(())
    }
}
