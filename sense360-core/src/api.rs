//! HTTP wire format shared by the server and the client.
//!
//! Every response carries `success`. Field names are camelCase to match the
//! flashing frontend.

use crate::audit::AccessLogEntry;
use crate::identify::DeviceIdentification;
use crate::registry::{DeviceSort, PublicDeviceView};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    #[serde(default)]
    pub mac_address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListDevicesQuery {
    pub sort: Option<DeviceSort>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessLogQuery {
    pub identifier: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub success: bool,
    pub device: PublicDeviceView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub success: bool,
    pub devices: Vec<PublicDeviceView>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentificationResponse {
    pub success: bool,
    pub identification: DeviceIdentification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogsResponse {
    pub success: bool,
    pub logs: Vec<AccessLogEntry>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub devices: usize,
    pub active_devices: usize,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
