//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build workers → WorkerManager::start
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast stop → Final flush/drain → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then workers, then admin listener
//! - Shutdown has a deadline: workers past it are abandoned

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
