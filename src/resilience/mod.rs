//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Audit batch persist fails:
//!     → backoff.rs (delay grows per retry, capped, jittered)
//!     → retry same batch until max_retries
//!     → give up: batch dropped, failure counted
//! ```
//!
//! # Design Decisions
//! - Retry count and backoff growth come from configuration
//! - Jittered backoff avoids synchronized retries against a shared sink

pub mod backoff;

pub use backoff::{calculate_backoff, BackoffPolicy};
