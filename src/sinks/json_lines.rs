//! Append-only JSON-lines file sink.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::sinks::{AuditSink, SinkError};
use crate::workers::entry::AuditLogEntry;

/// Writes each entry as one JSON object per line.
///
/// A batch is serialized up front and written with a single call, so a
/// serialization failure never leaves a partial batch in the file. A failed
/// write is rolled back by truncating to the pre-write length. When that
/// truncation also fails (the file is not a regular file, or the disk is
/// gone), a retry can repeat lines already written.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonLinesSink {
    async fn persist(&self, batch: &[AuditLogEntry]) -> Result<(), SinkError> {
        let mut buf = Vec::with_capacity(batch.len() * 128);
        for entry in batch {
            serde_json::to_writer(&mut buf, entry)?;
            buf.push(b'\n');
        }

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let start = file.metadata().await?.len();
        let written = async {
            file.write_all(&buf).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            // Drop any partial tail so the retried batch is not appended twice.
            if let Err(trunc) = file.set_len(start).await {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %trunc,
                    "Could not roll back partial audit write; the file may hold duplicate lines"
                );
            }
            return Err(e.into());
        }

        tracing::debug!(path = %self.path.display(), entries = batch.len(), "Audit batch written");
        Ok(())
    }
}
