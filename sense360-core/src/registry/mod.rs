//! In-memory device registry keyed by MAC address.
//!
//! Holds exactly one [`DeviceRecord`] per MAC address and hands out a random,
//! never-reused public id for each one. Records are never removed; they are
//! only deactivated.

pub mod models;
pub mod public_id;

pub use models::{DeviceRecord, DeviceSort, PublicDeviceView, RegisterDevice};

use crate::{RegistryError, RegistryResult};
use chrono::{DateTime, Utc};
use garde::Validate;
use models::non_empty;
use public_id::generate_public_id;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Registry of devices seen by the flashing tool.
///
/// Construct once and share behind an `Arc`. Every mutation takes the write
/// lock for a single check-then-insert-or-update, which keeps concurrent first
/// registrations of the same MAC from producing two records.
#[derive(Default)]
pub struct DeviceRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    /// Insertion order.
    records: Vec<DeviceRecord>,
    by_mac: HashMap<String, usize>,
    by_public_id: HashMap<String, usize>,
    last_internal_id: u64,
}

impl RegistryInner {
    fn allocate_public_id(&self) -> String {
        loop {
            let candidate = generate_public_id();
            if !self.by_public_id.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn insert(&mut self, input: RegisterDevice, now: DateTime<Utc>) -> &DeviceRecord {
        self.last_internal_id += 1;
        let record = DeviceRecord {
            internal_id: self.last_internal_id,
            public_id: self.allocate_public_id(),
            mac_address: input.mac_address,
            chip_type: input.chip_type,
            flash_size: non_empty(input.flash_size),
            device_type: non_empty(input.device_type),
            registered_at: now,
            last_seen: now,
            is_active: true,
        };

        let idx = self.records.len();
        self.by_mac.insert(record.mac_address.clone(), idx);
        self.by_public_id.insert(record.public_id.clone(), idx);
        self.records.push(record);
        &self.records[idx]
    }

    fn by_public_id(&self, public_id: &str) -> Option<&DeviceRecord> {
        self.by_public_id
            .get(public_id)
            .map(|&idx| &self.records[idx])
    }

    fn by_public_id_mut(&mut self, public_id: &str) -> Option<&mut DeviceRecord> {
        let idx = *self.by_public_id.get(public_id)?;
        self.records.get_mut(idx)
    }

    fn by_mac_mut(&mut self, mac_address: &str) -> Option<&mut DeviceRecord> {
        let idx = *self.by_mac.get(mac_address)?;
        self.records.get_mut(idx)
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device, or refresh the existing record for its MAC address.
    ///
    /// A refresh keeps the record's public id, replaces the chip type, only
    /// replaces flash size and device type when a non-empty value is given,
    /// bumps `last_seen`, and reactivates the record.
    pub fn register_device(&self, input: RegisterDevice) -> RegistryResult<PublicDeviceView> {
        input
            .validate()
            .map_err(|report| RegistryError::Validation(format_report(&report)))?;

        let now = Utc::now();
        let mut inner = self.write();

        if let Some(record) = inner.by_mac_mut(&input.mac_address) {
            record.refresh(input, now);
            debug!(public_id = %record.public_id, "Refreshed device registration");
            return Ok(record.to_public_view());
        }

        let record = inner.insert(input, now);
        info!(
            public_id = %record.public_id,
            chip_type = %record.chip_type,
            "Registered new device"
        );
        Ok(record.to_public_view())
    }

    /// Look up a device by its public id. Has no side effects.
    pub fn get_device_by_id(&self, public_id: &str) -> RegistryResult<PublicDeviceView> {
        self.read()
            .by_public_id(public_id)
            .map(DeviceRecord::to_public_view)
            .ok_or_else(|| RegistryError::NotFound(public_id.to_string()))
    }

    /// Look up the private record for a MAC address.
    ///
    /// Server-internal only: the returned record carries the MAC address and
    /// must never be handed across the trust boundary.
    pub fn get_device_by_mac(&self, mac_address: &str) -> Option<DeviceRecord> {
        let inner = self.read();
        inner
            .by_mac
            .get(mac_address)
            .map(|&idx| inner.records[idx].clone())
    }

    /// Active devices in insertion order.
    pub fn list_active_devices(&self) -> Vec<PublicDeviceView> {
        self.read()
            .records
            .iter()
            .filter(|r| r.is_active)
            .map(DeviceRecord::to_public_view)
            .collect()
    }

    /// Active devices in the requested order.
    pub fn list_active_devices_sorted(&self, sort: DeviceSort) -> Vec<PublicDeviceView> {
        let mut devices = self.list_active_devices();
        match sort {
            DeviceSort::LastSeenDesc => devices.sort_by(|a, b| b.last_seen().cmp(&a.last_seen())),
            DeviceSort::ChipType => devices.sort_by(|a, b| a.chip_type().cmp(b.chip_type())),
            DeviceSort::DeviceId => devices.sort_by(|a, b| a.device_id().cmp(b.device_id())),
        }
        devices
    }

    /// Mark a device inactive. Deactivating an inactive device succeeds.
    pub fn deactivate(&self, public_id: &str) -> RegistryResult<()> {
        let mut inner = self.write();
        let record = inner
            .by_public_id_mut(public_id)
            .ok_or_else(|| RegistryError::NotFound(public_id.to_string()))?;

        if record.is_active {
            record.is_active = false;
            info!(public_id = %public_id, "Deactivated device");
        } else {
            debug!(public_id = %public_id, "Device already inactive");
        }
        Ok(())
    }

    /// Total number of records, active or not.
    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_count(&self) -> usize {
        self.read().records.iter().filter(|r| r.is_active).count()
    }

    /// Run `f` against the record matching `key`, if any, under the write lock.
    pub(crate) fn update_record<R>(
        &self,
        key: crate::presence::DeviceKey<'_>,
        f: impl FnOnce(&mut DeviceRecord) -> R,
    ) -> Option<R> {
        use crate::presence::DeviceKey;

        let mut inner = self.write();
        let record = match key {
            DeviceKey::PublicId(public_id) => inner.by_public_id_mut(public_id),
            DeviceKey::Mac(mac_address) => inner.by_mac_mut(mac_address),
        }?;
        Some(f(record))
    }

    // Mutations finish updating the maps before anything can panic, so a
    // poisoned lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn format_report(report: &garde::Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            let path = path.to_string();
            if path.is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
