//! Per-request workspaces
//!
//! Every signing job gets its own directory under the configured temp root,
//! named after a ULID so directories sort by creation time. The directory is
//! removed when the [`Workspace`] is dropped or explicitly cleaned up,
//! whichever comes first, and never twice.

use rand::{rngs::OsRng, RngCore};
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use ulid::Ulid;

use crate::types::WorkspaceError;

const UNSIGNED_SUFFIX: &str = "_unsigned.shortcut";
const SIGNED_SUFFIX: &str = ".shortcut";

/// Allocates workspaces under a fixed root directory
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// The root must already exist
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, uniquely named workspace directory
    pub async fn create(&self) -> Result<Workspace, WorkspaceError> {
        let id = new_workspace_id()?;
        let dir = self.root.join(id.to_string());

        // create_dir (not create_dir_all) fails if the directory already exists
        tokio::fs::create_dir(&dir)
            .await
            .map_err(|source| WorkspaceError::CreateDir {
                path: dir.display().to_string(),
                source,
            })?;

        debug!(workspace_id = %id, dir = %dir.display(), "Workspace created");

        Ok(Workspace {
            id,
            unsigned_path: dir.join(format!("{}{}", id, UNSIGNED_SUFFIX)),
            signed_path: dir.join(format!("{}{}", id, SIGNED_SUFFIX)),
            dir,
            removed: false,
        })
    }
}

/// Generate a time-ordered 128-bit identifier: 48 bits of milliseconds since
/// the epoch followed by 80 bits from the operating system's random source.
fn new_workspace_id() -> Result<Ulid, WorkspaceError> {
    let millis = u64::try_from(chrono::Utc::now().timestamp_millis())
        .map_err(|_| WorkspaceError::Clock)?;

    let mut random = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut random[6..])
        .map_err(|e| WorkspaceError::RandomSource(e.to_string()))?;

    Ok(Ulid::from_parts(millis, u128::from_be_bytes(random)))
}

/// An isolated directory owned by exactly one signing job
#[derive(Debug)]
pub struct Workspace {
    id: Ulid,
    dir: PathBuf,
    unsigned_path: PathBuf,
    signed_path: PathBuf,
    removed: bool,
}

impl Workspace {
    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the unsigned shortcut is written: `<id>_unsigned.shortcut`
    pub fn unsigned_path(&self) -> &Path {
        &self.unsigned_path
    }

    /// Where the signer writes its output: `<id>.shortcut`
    pub fn signed_path(&self) -> &Path {
        &self.signed_path
    }

    /// Remove the workspace without blocking the runtime
    pub async fn cleanup(mut self) {
        self.removed = true;
        let result = tokio::fs::remove_dir_all(&self.dir).await;
        self.log_removal(result);
    }

    fn log_removal(&self, result: std::io::Result<()>) {
        match result {
            Ok(()) => {
                debug!(workspace_id = %self.id, "Workspace removed");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(workspace_id = %self.id, "Workspace already removed");
            }
            Err(e) => {
                error!(
                    workspace_id = %self.id,
                    dir = %self.dir.display(),
                    error = %e,
                    "Failed to remove workspace directory"
                );
            }
        }
    }
}

/// Fallback for jobs that end before `cleanup` runs; removal is synchronous here.
impl Drop for Workspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        let result = std::fs::remove_dir_all(&self.dir);
        self.log_removal(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_workspace_layout() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let workspace = manager.create().await.unwrap();
        let id = workspace.id().to_string();

        assert!(workspace.dir().is_dir());
        assert_eq!(workspace.dir(), root.path().join(&id));
        assert_eq!(
            workspace.unsigned_path(),
            root.path().join(&id).join(format!("{}_unsigned.shortcut", id))
        );
        assert_eq!(
            workspace.signed_path(),
            root.path().join(&id).join(format!("{}.shortcut", id))
        );
    }

    #[tokio::test]
    async fn test_workspace_removed_on_drop() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let dir = {
            let workspace = manager.create().await.unwrap();
            std::fs::write(workspace.unsigned_path(), b"content").unwrap();
            workspace.dir().to_path_buf()
        };

        assert!(!dir.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_explicit_cleanup() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let workspace = manager.create().await.unwrap();
        let dir = workspace.dir().to_path_buf();
        std::fs::write(workspace.signed_path(), b"signed").unwrap();
        workspace.cleanup().await;

        assert!(!dir.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_of_missing_directory() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let workspace = manager.create().await.unwrap();
        std::fs::remove_dir_all(workspace.dir()).unwrap();

        // Logged at debug, no panic, and drop does not retry
        workspace.cleanup().await;
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_directory() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let workspace = manager.create().await.unwrap();
        std::fs::remove_dir_all(workspace.dir()).unwrap();

        // Must not panic
        drop(workspace);
    }

    #[tokio::test]
    async fn test_missing_root_is_workspace_error() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().join("does-not-exist"));

        let err = manager.create().await.unwrap_err();
        assert!(matches!(err, WorkspaceError::CreateDir { .. }));
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_time_ordered() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let mut previous_ms = 0;
        let mut seen = HashSet::new();
        let mut workspaces = Vec::new();
        for _ in 0..50 {
            let workspace = manager.create().await.unwrap();
            let id = workspace.id();
            assert!(id.timestamp_ms() >= previous_ms);
            previous_ms = id.timestamp_ms();
            assert!(seen.insert(id.to_string()));
            workspaces.push(workspace);
        }

        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 50);
        drop(workspaces);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_id_string_sorts_by_time() {
        let earlier = Ulid::from_parts(1_000, u128::MAX);
        let later = Ulid::from_parts(1_001, 0);
        assert!(earlier.to_string() < later.to_string());
        assert_eq!(earlier.to_string().len(), 26);
    }
}
