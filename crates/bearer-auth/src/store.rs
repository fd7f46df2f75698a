//! Single-slot credential storage
//!
//! Each storage key (a file path) holds at most one JSON-encoded
//! `CredentialRecord`. Every write goes to a staging file in the same
//! directory and is then moved into place, so a reader sees either the old
//! record or the new one and never an empty slot. Seeding uses a hard link
//! instead of a rename so an existing record is never clobbered.
//!
//! The store keeps no in-memory state: every call goes to disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::CredentialRecord;

/// Per-process sequence for staging file names, so concurrent writes to the
/// same key never share a staging file.
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Handle for durable single-slot credential storage.
///
/// Constructed explicitly and handed to the lifecycle manager; there is no
/// process-wide default path.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialStore;

impl CredentialStore {
    pub fn new() -> Self {
        Self
    }

    /// Persist `seed` at `key` if the slot is empty.
    ///
    /// Idempotent: an existing record is left untouched, whatever the seed.
    /// Returns `true` when the seed was written.
    pub async fn initialize(&self, key: &Path, seed: &CredentialRecord) -> Result<bool> {
        if tokio::fs::try_exists(key)
            .await
            .map_err(|e| Error::StorageIo(format!("checking {}: {e}", key.display())))?
        {
            debug!(path = %key.display(), "credential slot already populated, keeping it");
            return Ok(false);
        }

        let tmp_path = write_staging(key, seed).await?;

        // hard_link refuses to overwrite, unlike rename
        let linked = match tokio::fs::hard_link(&tmp_path, key).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) if hard_link_unavailable(&e) => {
                debug!(
                    path = %key.display(),
                    error = %e,
                    "hard link unavailable, creating slot directly"
                );
                create_slot(key, seed).await
            }
            Err(e) => Err(Error::StorageIo(format!(
                "linking seed credential into {}: {e}",
                key.display()
            ))),
        };
        let _ = tokio::fs::remove_file(&tmp_path).await;

        if linked? {
            info!(path = %key.display(), subject = %seed.subject, "seeded credential store");
            Ok(true)
        } else {
            debug!(path = %key.display(), "credential slot populated concurrently, keeping it");
            Ok(false)
        }
    }

    /// Read and decode the record stored at `key`.
    ///
    /// A missing or unreadable file is `StorageIo`; bytes that do not decode
    /// to a record are `StorageCorrupt`. Nothing is repaired automatically.
    pub async fn load(&self, key: &Path) -> Result<CredentialRecord> {
        let contents = tokio::fs::read(key)
            .await
            .map_err(|e| Error::StorageIo(format!("reading {}: {e}", key.display())))?;

        serde_json::from_slice(&contents)
            .map_err(|e| Error::StorageCorrupt(format!("parsing {}: {e}", key.display())))
    }

    /// Atomically supersede the record at `key` with `record`.
    pub async fn replace(&self, key: &Path, record: &CredentialRecord) -> Result<()> {
        let tmp_path = write_staging(key, record).await?;

        if let Err(e) = tokio::fs::rename(&tmp_path, key).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(Error::StorageIo(format!(
                "renaming staging file over {}: {e}",
                key.display()
            )));
        }

        metrics::counter!("credential_store_writes_total").increment(1);
        debug!(path = %key.display(), issued_at = record.issued_at, "persisted credential");
        Ok(())
    }
}

/// Staging location for `key`: a hidden sibling file in the same directory,
/// so the final rename never crosses filesystems.
fn staging_path(key: &Path) -> Result<PathBuf> {
    let file_name = key
        .file_name()
        .ok_or_else(|| Error::StorageIo(format!("{} has no file name", key.display())))?;
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    let staging = format!(
        ".{}.tmp.{}.{seq}",
        file_name.to_string_lossy(),
        std::process::id()
    );
    Ok(match key.parent() {
        Some(dir) => dir.join(staging),
        None => PathBuf::from(staging),
    })
}

fn encode(record: &CredentialRecord) -> Result<String> {
    serde_json::to_string_pretty(record)
        .map_err(|e| Error::StorageIo(format!("serializing credential: {e}")))
}

/// Write `json` to a freshly created `file` at `path` and flush it to disk.
///
/// Sets file permissions to 0600 (owner read/write only) since the file
/// holds live tokens.
async fn write_contents(file: &mut File, path: &Path, json: &str) -> std::io::Result<()> {
    file.write_all(json.as_bytes()).await?;
    file.sync_all().await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}

/// Serialize `record` into a new staging file for `key`.
async fn write_staging(key: &Path, record: &CredentialRecord) -> Result<PathBuf> {
    let json = encode(record)?;
    let tmp_path = staging_path(key)?;

    let write = async {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .await?;
        write_contents(&mut file, &tmp_path, &json).await
    };

    if let Err(e) = write.await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(Error::StorageIo(format!(
            "writing staging file {}: {e}",
            tmp_path.display()
        )));
    }

    Ok(tmp_path)
}

/// Filesystems such as FAT or some network mounts reject hard links outright.
fn hard_link_unavailable(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::Unsupported | ErrorKind::PermissionDenied
    )
}

/// Create `key` directly, returning `false` if it already exists.
///
/// Seeding path for filesystems without hard links. Unlike the staged path,
/// a reader racing this write can see a partially written file.
async fn create_slot(key: &Path, record: &CredentialRecord) -> Result<bool> {
    let json = encode(record)?;

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(key)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(Error::StorageIo(format!("creating {}: {e}", key.display())));
        }
    };

    if let Err(e) = write_contents(&mut file, key, &json).await {
        let _ = tokio::fs::remove_file(key).await;
        return Err(Error::StorageIo(format!("writing {}: {e}", key.display())));
    }

    Ok(true)
}
