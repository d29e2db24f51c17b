//! Audit log entries.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::workers::error::WorkerError;

/// Severity of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl AuditLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditLevel::Debug => "debug",
            AuditLevel::Info => "info",
            AuditLevel::Warn => "warn",
            AuditLevel::Error => "error",
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditLevel {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(AuditLevel::Debug),
            "info" => Ok(AuditLevel::Info),
            "warn" | "warning" => Ok(AuditLevel::Warn),
            "error" => Ok(AuditLevel::Error),
            other => Err(WorkerError::InvalidEntry(format!("unknown level '{}'", other))),
        }
    }
}

/// One structured record destined for durable storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: AuditLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Filled in on submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl AuditLogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(level: AuditLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            attributes: BTreeMap::new(),
            content_hash: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Reject entries that must not reach the queue.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.message.trim().is_empty() {
            return Err(WorkerError::InvalidEntry("message is empty".into()));
        }
        Ok(())
    }

    /// Hex SHA-256 over timestamp, level, message and attributes.
    ///
    /// Attributes are ordered, so equal entries always hash equally.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(
            self.timestamp
                .to_rfc3339_opts(SecondsFormat::Nanos, true)
                .as_bytes(),
        );
        hasher.update([0x1f]);
        hasher.update(self.level.as_str().as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.message.as_bytes());
        for (key, value) in &self.attributes {
            hasher.update([0x1f]);
            hasher.update(key.as_bytes());
            hasher.update([0x1e]);
            hasher.update(value.to_string().as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// The stored hash, or a freshly computed one.
    pub fn hash(&self) -> String {
        self.content_hash.clone().unwrap_or_else(|| self.compute_hash())
    }
}
