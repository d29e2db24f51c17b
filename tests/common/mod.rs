//! Shared utilities for integration and load testing.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use background_workers::admin::{setup_admin_router, AdminState};
use background_workers::sweepers::{SweepError, Sweeper};
use background_workers::workers::WorkerManager;

/// Serve the admin API on an ephemeral port.
#[allow(dead_code)]
pub async fn start_admin(manager: Arc<WorkerManager>, api_key: Option<&str>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = setup_admin_router(AdminState::new(manager, api_key.map(String::from)));

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Sweeper with scripted behavior.
#[allow(dead_code)]
pub struct ScriptedSweeper {
    pub name: &'static str,
    pub removed: u64,
    pub delay: Duration,
    pub error: Option<&'static str>,
    pub runs: AtomicU64,
}

#[allow(dead_code)]
impl ScriptedSweeper {
    pub fn removing(name: &'static str, removed: u64) -> Self {
        Self {
            name,
            removed,
            delay: Duration::ZERO,
            error: None,
            runs: AtomicU64::new(0),
        }
    }

    pub fn failing(name: &'static str, error: &'static str) -> Self {
        Self {
            error: Some(error),
            ..Self::removing(name, 0)
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sweeper for ScriptedSweeper {
    fn name(&self) -> &str {
        self.name
    }

    async fn sweep(&self) -> Result<u64, SweepError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match self.error {
            Some(reason) => Err(SweepError::Failed(reason.into())),
            None => Ok(self.removed),
        }
    }
}
