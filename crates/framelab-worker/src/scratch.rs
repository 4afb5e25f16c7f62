//! Per-job scratch directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::logging::JobLogger;

/// A temporary directory owned by one job attempt.
///
/// Call [`ScratchDir::release`] on every exit path. Dropping without release
/// still removes the directory, but silently.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create `{parent}/{prefix}XXXXXX`, creating `parent` if needed.
    pub async fn create(parent: &Path, prefix: &str) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(parent).await?;
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory. A cleanup failure is logged and swallowed so it
    /// never replaces the job's own result.
    pub fn release(self, logger: &JobLogger) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            logger.log_warning(&format!(
                "Failed to remove scratch dir {}: {}",
                path.display(),
                e
            ));
        }
    }
}
