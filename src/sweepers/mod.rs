//! Cleanup sweep tasks.
//!
//! # Data Flow
//! ```text
//! CleanupWorker (scheduled tick or manual trigger)
//!     → Sweeper::sweep for each registered sweeper, in order
//!     → removed count or error per sweeper
//! ```
//!
//! # Design Decisions
//! - Sweeps are idempotent: running twice in a row removes nothing the
//!   second time
//! - A sweeper reports how many records it removed, not which ones

pub mod file_retention;

use async_trait::async_trait;
use thiserror::Error;

pub use file_retention::FileRetentionSweeper;

/// Errors returned by a sweeper.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

/// One idempotent maintenance task.
#[async_trait]
pub trait Sweeper: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Purge expired records. Returns how many were removed.
    async fn sweep(&self) -> Result<u64, SweepError>;
}
