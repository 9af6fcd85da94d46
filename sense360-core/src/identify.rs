//! Device identification by MAC address.
//!
//! Answers "what is this board?" for the flashing UI without revealing
//! anything beyond what the public view already carries.

use crate::registry::{DeviceRecord, DeviceRegistry};
use serde::{Deserialize, Serialize};

const GENERIC_DEVICE_TYPE: &str = "ESP32 Device";
const GENERIC_CHIP_FAMILY: &str = "ESP32";
const UNKNOWN_FLASH_SIZE: &str = "Unknown";

/// Public-safe identification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentification {
    pub device_type: String,
    pub chip_family: String,
    pub flash_size: String,
    pub sensors: Vec<String>,
    pub description: String,
    pub is_registered: bool,
}

impl DeviceIdentification {
    /// Generic payload for a board the registry has never seen.
    pub fn unregistered() -> Self {
        Self {
            device_type: GENERIC_DEVICE_TYPE.to_string(),
            chip_family: GENERIC_CHIP_FAMILY.to_string(),
            flash_size: UNKNOWN_FLASH_SIZE.to_string(),
            sensors: Vec::new(),
            description: "Unregistered ESP32 device".to_string(),
            is_registered: false,
        }
    }

    fn from_record(record: &DeviceRecord) -> Self {
        Self {
            device_type: record
                .device_type()
                .unwrap_or(GENERIC_DEVICE_TYPE)
                .to_string(),
            chip_family: record.chip_type().to_string(),
            flash_size: record.flash_size().unwrap_or(UNKNOWN_FLASH_SIZE).to_string(),
            sensors: Vec::new(),
            description: format!("Registered {} device", record.chip_type()),
            is_registered: true,
        }
    }
}

/// Identify a device by MAC address.
///
/// Never fails: unknown addresses get [`DeviceIdentification::unregistered`].
/// Does not refresh presence.
pub fn identify_device(registry: &DeviceRegistry, mac_address: &str) -> DeviceIdentification {
    registry
        .get_device_by_mac(mac_address)
        .map(|record| DeviceIdentification::from_record(&record))
        .unwrap_or_else(DeviceIdentification::unregistered)
}
