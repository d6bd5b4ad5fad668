//! Artifact Store: sandboxed per-thread staging area for invocation
//! uploads and agent outputs.
//!
//! Every invocation gets `<ARTIFACTS_ROOT>/<thread_id>/in/` (caller
//! uploads, staged before forwarding) and a sibling `out/` (agent-produced
//! outputs). Listing or downloading `out/` contents is glue outside this
//! core; the store only creates the directories and writes the `in/` side.

use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

pub struct ArtifactStore {
    root: PathBuf,
    max_upload_bytes: u64,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, max_upload_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_upload_bytes,
        }
    }

    fn thread_dir(&self, thread_id: Uuid) -> PathBuf {
        self.root.join(thread_id.to_string())
    }

    /// Validate every file against `max_upload_bytes` before writing any
    /// of them, then write the validated set. If a later file still fails
    /// to write, every file already written for this request is removed
    /// so no partial upload survives a failed request.
    pub async fn stage_upload(&self, thread_id: Uuid, files: &[(String, Vec<u8>)]) -> AppResult<()> {
        for (name, bytes) in files {
            if bytes.len() as u64 > self.max_upload_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "'{name}' is {} bytes, exceeds the {} byte limit",
                    bytes.len(),
                    self.max_upload_bytes
                )));
            }
        }

        let in_dir = self.thread_dir(thread_id).join("in");
        let out_dir = self.thread_dir(thread_id).join("out");
        self.create_shared_dir(&in_dir).await?;
        self.create_shared_dir(&out_dir).await?;

        let mut written = Vec::new();
        for (name, bytes) in files {
            let sanitized = sanitize_basename(name);
            if sanitized.is_empty() {
                continue;
            }
            let path = in_dir.join(&sanitized);
            if let Err(e) = fs::write(&path, bytes).await {
                for p in &written {
                    fs::remove_file(p).await.ok();
                }
                return Err(AppError::internal(format!("failed to stage upload '{sanitized}': {e}")));
            }
            written.push(path);
        }

        Ok(())
    }

    /// Creates a directory with permissions that allow both the gateway
    /// process and the agent container's fixed user to write.
    async fn create_shared_dir(&self, dir: &Path) -> AppResult<()> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::internal(format!("failed to create artifact directory {dir:?}: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir, std::fs::Permissions::from_mode(0o777))
                .await
                .map_err(|e| AppError::internal(format!("failed to set permissions on {dir:?}: {e}")))?;
        }

        Ok(())
    }
}

/// Strips any directory components and rejects `""`, `"."`, `".."`.
fn sanitize_basename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    if matches!(base, "" | "." | "..") {
        String::new()
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_basename_rejects_dot_and_traversal() {
        assert_eq!(sanitize_basename(""), "");
        assert_eq!(sanitize_basename("."), "");
        assert_eq!(sanitize_basename(".."), "");
        assert_eq!(sanitize_basename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_basename("report.csv"), "report.csv");
    }

    #[tokio::test]
    async fn stage_upload_rejects_oversized_file_without_writing_any() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), 4);
        let thread_id = Uuid::new_v4();

        let err = store
            .stage_upload(thread_id, &[("small.txt".into(), b"ok".to_vec()), ("big.txt".into(), b"toolarge".to_vec())])
            .await;
        assert!(err.is_err());

        let in_dir = dir.path().join(thread_id.to_string()).join("in");
        assert!(!in_dir.join("small.txt").exists());
    }

    #[tokio::test]
    async fn stage_upload_writes_sanitized_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), 1024);
        let thread_id = Uuid::new_v4();

        store
            .stage_upload(thread_id, &[("data.json".into(), b"{}".to_vec())])
            .await
            .unwrap();

        let in_dir = dir.path().join(thread_id.to_string()).join("in");
        let out_dir = dir.path().join(thread_id.to_string()).join("out");
        assert!(in_dir.join("data.json").exists());
        assert!(out_dir.exists());
    }
}
