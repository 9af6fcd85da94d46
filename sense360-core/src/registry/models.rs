//! Device registry model types.

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// A device as the registry holds it privately.
///
/// Not `Serialize`: the MAC address must never reach an untrusted client.
/// Anything that leaves the process goes through [`DeviceRecord::to_public_view`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub(crate) internal_id: u64,
    pub(crate) mac_address: String,
    pub(crate) public_id: String,
    pub(crate) chip_type: String,
    pub(crate) flash_size: Option<String>,
    pub(crate) device_type: Option<String>,
    pub(crate) registered_at: DateTime<Utc>,
    pub(crate) last_seen: DateTime<Utc>,
    pub(crate) is_active: bool,
}

impl DeviceRecord {
    pub fn internal_id(&self) -> u64 {
        self.internal_id
    }

    pub fn mac_address(&self) -> &str {
        &self.mac_address
    }

    pub fn public_id(&self) -> &str {
        &self.public_id
    }

    pub fn chip_type(&self) -> &str {
        &self.chip_type
    }

    pub fn flash_size(&self) -> Option<&str> {
        self.flash_size.as_deref()
    }

    pub fn device_type(&self) -> Option<&str> {
        self.device_type.as_deref()
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Project the record onto its externally visible view.
    ///
    /// This is the only place a [`PublicDeviceView`] is built.
    pub fn to_public_view(&self) -> PublicDeviceView {
        PublicDeviceView {
            device_id: self.public_id.clone(),
            chip_type: self.chip_type.clone(),
            flash_size: self.flash_size.clone(),
            device_type: self.device_type.clone(),
            last_seen: self.last_seen,
            is_active: self.is_active,
        }
    }

    /// Apply a re-registration for the same MAC address.
    pub(crate) fn refresh(&mut self, input: RegisterDevice, now: DateTime<Utc>) {
        self.chip_type = input.chip_type;
        if let Some(flash_size) = non_empty(input.flash_size) {
            self.flash_size = Some(flash_size);
        }
        if let Some(device_type) = non_empty(input.device_type) {
            self.device_type = Some(device_type);
        }
        self.last_seen = now;
        self.is_active = true;
    }
}

/// Public view of a device. Carries no MAC address or internal id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicDeviceView {
    device_id: String,
    chip_type: String,
    flash_size: Option<String>,
    device_type: Option<String>,
    last_seen: DateTime<Utc>,
    is_active: bool,
}

impl PublicDeviceView {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn chip_type(&self) -> &str {
        &self.chip_type
    }

    pub fn flash_size(&self) -> Option<&str> {
        self.flash_size.as_deref()
    }

    pub fn device_type(&self) -> Option<&str> {
        self.device_type.as_deref()
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

/// Registration input, as posted by the flashing frontend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDevice {
    #[serde(default)]
    #[garde(custom(not_blank))]
    pub mac_address: String,

    #[serde(default)]
    #[garde(custom(not_blank))]
    pub chip_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub flash_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub device_type: Option<String>,
}

impl RegisterDevice {
    pub fn new(mac_address: impl Into<String>, chip_type: impl Into<String>) -> Self {
        Self {
            mac_address: mac_address.into(),
            chip_type: chip_type.into(),
            flash_size: None,
            device_type: None,
        }
    }

    pub fn with_flash_size(mut self, flash_size: impl Into<String>) -> Self {
        self.flash_size = Some(flash_size.into());
        self
    }

    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }
}

fn not_blank(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("must not be blank"));
    }
    Ok(())
}

/// Treat `Some("")` the same as an absent value.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Explicit orderings a consumer may request for device listings.
///
/// Without one, listings keep insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSort {
    /// Most recently seen first.
    LastSeenDesc,
    ChipType,
    DeviceId,
}
