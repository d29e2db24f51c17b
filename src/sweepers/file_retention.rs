//! Age-based file retention.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::config::RetentionRule;
use crate::sweepers::{SweepError, Sweeper};

/// Deletes regular files in a directory once they are older than `max_age`.
///
/// Only the top level of the directory is examined. A missing directory is
/// treated as empty.
#[derive(Debug, Clone)]
pub struct FileRetentionSweeper {
    name: String,
    dir: PathBuf,
    max_age: Duration,
}

impl FileRetentionSweeper {
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        let dir = dir.into();
        Self {
            name: format!("retention:{}", dir.display()),
            dir,
            max_age,
        }
    }

    fn is_expired(&self, modified: SystemTime, now: SystemTime) -> bool {
        now.duration_since(modified)
            .map(|age| age > self.max_age)
            .unwrap_or(false)
    }
}

impl From<&RetentionRule> for FileRetentionSweeper {
    fn from(rule: &RetentionRule) -> Self {
        Self::new(&rule.path, Duration::from_secs(rule.max_age_secs))
    }
}

#[async_trait]
impl Sweeper for FileRetentionSweeper {
    fn name(&self) -> &str {
        &self.name
    }

    async fn sweep(&self) -> Result<u64, SweepError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(dir = %self.dir.display(), "Retention directory missing, nothing to sweep");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() || !self.is_expired(metadata.modified()?, now) {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                // Removed concurrently; still counts as swept.
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        if removed > 0 {
            tracing::info!(dir = %self.dir.display(), removed, "Removed expired files");
        }
        Ok(removed)
    }
}
