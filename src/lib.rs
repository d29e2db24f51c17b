//! Background worker subsystem.
//!
//! Runs an audit log writer, a service health monitor and a periodic cleanup
//! sweeper next to an application, under one manager with bounded shutdown.

// Workers
pub mod registry;
pub mod sinks;
pub mod sweepers;
pub mod workers;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

// Operator surface
pub mod admin;

pub use config::schema::WorkerConfig;
pub use lifecycle::Shutdown;
pub use workers::{AggregatedHealth, WorkerError, WorkerManager};
