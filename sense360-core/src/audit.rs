//! Append-only access log for device events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// Kind of device access being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    /// Serial connection opened from the browser
    Connection,
    /// Firmware written to the device
    Flash,
    /// Flash erased
    Erase,

    /// Registry boundary calls
    Register,
    Lookup,
    Ping,
    Deactivate,
    Identify,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Flash => "flash",
            Self::Erase => "erase",
            Self::Register => "register",
            Self::Lookup => "lookup",
            Self::Ping => "ping",
            Self::Deactivate => "deactivate",
            Self::Identify => "identify",
        }
    }
}

/// An access event to be recorded
#[derive(Debug, Clone)]
pub struct NewAccessLogEntry {
    pub identifier: String,
    pub access_type: AccessType,
    pub success: bool,
    pub error_message: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewAccessLogEntry {
    pub fn succeeded(identifier: impl Into<String>, access_type: AccessType) -> Self {
        Self {
            identifier: identifier.into(),
            access_type,
            success: true,
            error_message: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn failed(
        identifier: impl Into<String>,
        access_type: AccessType,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            access_type,
            success: false,
            error_message: Some(error_message.into()),
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// A recorded access event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub id: u64,
    pub identifier: String,
    pub access_type: AccessType,
    pub success: bool,
    pub error_message: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub accessed_at: DateTime<Utc>,
}

/// Access log
///
/// Entries are kept in memory and, when a file is configured, mirrored to it
/// as JSON lines. Entries are never mutated or removed.
#[derive(Default)]
pub struct AccessLog {
    inner: Mutex<AccessLogInner>,
}

#[derive(Default)]
struct AccessLogInner {
    entries: Vec<AccessLogEntry>,
    mirror: Option<Mirror>,
}

struct Mirror {
    path: PathBuf,
    file: File,
}

impl AccessLog {
    /// Create an in-memory access log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an access log that also appends every entry to `path`
    ///
    /// The append and flush happen synchronously inside [`AccessLog::log_access`]
    /// while the log's mutex is held, so callers on an async runtime block
    /// for one small write per event. Suited to the registry's low event
    /// rate; a high-volume deployment should move the write to
    /// `tokio::task::spawn_blocking` or a dedicated writer task.
    pub fn with_file(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        info!("Access log mirror initialized: {:?}", path);

        Ok(Self {
            inner: Mutex::new(AccessLogInner {
                entries: Vec::new(),
                mirror: Some(Mirror {
                    path: path.to_path_buf(),
                    file,
                }),
            }),
        })
    }

    /// Record an access event
    pub fn log_access(&self, new_entry: NewAccessLogEntry) -> AccessLogEntry {
        let mut inner = self.lock();

        let entry = AccessLogEntry {
            id: inner.entries.len() as u64 + 1,
            identifier: new_entry.identifier,
            access_type: new_entry.access_type,
            success: new_entry.success,
            error_message: new_entry.error_message,
            ip_address: new_entry.ip_address,
            user_agent: new_entry.user_agent,
            accessed_at: Utc::now(),
        };

        if let Some(mirror) = inner.mirror.as_mut() {
            if let Err(e) = mirror.append(&entry) {
                warn!("Failed to write access log {:?}: {}", mirror.path, e);
            }
        }

        inner.entries.push(entry.clone());
        entry
    }

    /// Most recent entries first, truncated to `limit`
    pub fn entries(&self, limit: Option<usize>) -> Vec<AccessLogEntry> {
        let inner = self.lock();
        inner
            .entries
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Most recent entries for one identifier first, truncated to `limit`
    pub fn entries_for(&self, identifier: &str, limit: Option<usize>) -> Vec<AccessLogEntry> {
        let inner = self.lock();
        inner
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.identifier == identifier)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, AccessLogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Mirror {
    fn append(&mut self, entry: &AccessLogEntry) -> std::io::Result<()> {
        let json = serde_json::to_string(entry)?;
        writeln!(self.file, "{}", json)?;
        self.file.flush()
    }
}
