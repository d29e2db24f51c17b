//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! Request completes (middleware)
//!     → table.rs (find or create service entry)
//!     → service.rs (atomic counter update)
//!
//! Health evaluation (workers::health):
//!     → table.rs snapshot_all
//!     → error rate / average latency per service
//! ```
//!
//! # Design Decisions
//! - Entries live for the process lifetime (no eviction)
//! - Recording is lock-free after the first call for a service

pub mod service;
pub mod table;

pub use service::{ServiceEntry, ServiceStats, ERROR_STATUS_THRESHOLD};
pub use table::ServiceRegistry;
