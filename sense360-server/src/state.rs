//! Shared handler state.

use axum::http::HeaderMap;
use sense360_core::{AccessLog, AccessType, DeviceRegistry, NewAccessLogEntry};
use std::sync::Arc;

/// Identifier recorded when a call has no public device id to attribute.
pub const UNREGISTERED: &str = "unregistered";

/// Registry and access log, built once in `main` and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DeviceRegistry>,
    pub access_log: Arc<AccessLog>,
    pub access_log_default_limit: usize,
}

impl AppState {
    pub fn new(registry: DeviceRegistry, access_log: AccessLog, access_log_default_limit: usize) -> Self {
        Self {
            registry: Arc::new(registry),
            access_log: Arc::new(access_log),
            access_log_default_limit,
        }
    }

    /// Record the outcome of a boundary call. `identifier` must never be a MAC.
    pub fn record_access(
        &self,
        identifier: &str,
        access_type: AccessType,
        outcome: Result<(), String>,
        headers: &HeaderMap,
    ) {
        let entry = match outcome {
            Ok(()) => NewAccessLogEntry::succeeded(identifier, access_type),
            Err(e) => NewAccessLogEntry::failed(identifier, access_type, e),
        };
        self.access_log
            .log_access(entry.with_client(client_ip(headers), header_value(headers, "user-agent")));
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// First hop of `X-Forwarded-For`, if a proxy set one.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
}
