//! Sense360 Device Registry Core
//!
//! This library keeps the private mapping between a device's MAC address and
//! the public device id handed to the flashing frontend, tracks when devices
//! were last seen, and records an append-only trail of device access events.

pub mod api;
pub mod audit;
#[cfg(feature = "client")]
pub mod client;
pub mod identify;
pub mod presence;
pub mod registry;

pub use audit::{AccessLog, AccessLogEntry, AccessType, NewAccessLogEntry};
pub use identify::{identify_device, DeviceIdentification};
pub use presence::DeviceKey;
pub use registry::{DeviceRecord, DeviceRegistry, DeviceSort, PublicDeviceView, RegisterDevice};

use thiserror::Error;

/// Result type for registry operations
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Typed failures surfaced by the registry and its HTTP client.
///
/// None of these are fatal to the caller; each one is a distinct outcome the
/// boundary layer maps to a response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Registration input was missing or malformed.
    #[error("Invalid device data: {0}")]
    Validation(String),

    /// No record matches the given public device id.
    #[error("Device not found: {0}")]
    NotFound(String),

    /// The registry service could not be reached or is temporarily failing.
    #[error("Registry unavailable: {0}")]
    TransientUnavailable(String),

    /// The registry service answered with something unexpected.
    #[error("Transport error: {0}")]
    Transport(String),
}
