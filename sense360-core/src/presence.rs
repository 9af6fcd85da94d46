//! Presence tracking: recording that a device was observed.
//!
//! Presence updates only ever touch `last_seen`. Identity, capability fields
//! and the active flag are left alone.

use crate::registry::DeviceRegistry;
use crate::{RegistryError, RegistryResult};
use chrono::Utc;
use tracing::debug;

/// Either key a record can be found by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKey<'a> {
    PublicId(&'a str),
    /// Server-internal only.
    Mac(&'a str),
}

impl DeviceRegistry {
    /// Set `last_seen` to now on the matching record.
    ///
    /// Unknown keys are a no-op, not an error: pings from devices that just
    /// disconnected or were never registered are expected. Returns whether a
    /// record was updated.
    pub fn touch_last_seen(&self, key: DeviceKey<'_>) -> bool {
        let now = Utc::now();
        let touched = self
            .update_record(key, |record| record.last_seen = now)
            .is_some();

        if !touched {
            debug!("Presence refresh for unknown device ignored");
        }
        touched
    }

    /// Refresh presence for a public id, reporting a miss as `NotFound`.
    pub fn ping(&self, public_id: &str) -> RegistryResult<()> {
        if self.touch_last_seen(DeviceKey::PublicId(public_id)) {
            Ok(())
        } else {
            Err(RegistryError::NotFound(public_id.to_string()))
        }
    }
}
