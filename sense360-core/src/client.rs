//! HTTP client for the Sense360 registry service.

use crate::api::{
    AccessLogsResponse, DeviceResponse, DevicesResponse, ErrorResponse, HealthResponse,
    IdentificationResponse, IdentifyRequest, MessageResponse,
};
use crate::audit::AccessLogEntry;
use crate::identify::DeviceIdentification;
use crate::registry::{DeviceSort, PublicDeviceView, RegisterDevice};
use crate::{RegistryError, RegistryResult};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

/// HTTP client for the registry service.
pub struct DeviceApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl DeviceApiClient {
    /// Create a new client for the service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> RegistryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Register (or refresh) a device. Only the public view comes back.
    pub async fn register_device(&self, input: &RegisterDevice) -> RegistryResult<PublicDeviceView> {
        let request = self.request(Method::POST, "/api/devices/register").json(input);
        let response: DeviceResponse = send(request).await?;
        Ok(response.device)
    }

    /// Fetch a device by public id. The server records this as presence.
    pub async fn get_device(&self, device_id: &str) -> RegistryResult<PublicDeviceView> {
        let request = self.device_request(Method::GET, device_id, None)?;
        let response: DeviceResponse = send(request).await?;
        Ok(response.device)
    }

    /// List active devices, optionally sorted server-side.
    pub async fn list_active_devices(
        &self,
        sort: Option<DeviceSort>,
    ) -> RegistryResult<Vec<PublicDeviceView>> {
        let mut request = self.request(Method::GET, "/api/devices");
        if let Some(sort) = sort {
            request = request.query(&[("sort", sort_param(sort))]);
        }
        let response: DevicesResponse = send(request).await?;
        Ok(response.devices)
    }

    /// Refresh a device's last-seen timestamp.
    pub async fn ping_device(&self, device_id: &str) -> RegistryResult<()> {
        let request = self.device_request(Method::PATCH, device_id, Some("ping"))?;
        let _: MessageResponse = send(request).await?;
        Ok(())
    }

    /// Deactivate a device.
    pub async fn deactivate_device(&self, device_id: &str) -> RegistryResult<()> {
        let request = self.device_request(Method::DELETE, device_id, None)?;
        let _: MessageResponse = send(request).await?;
        Ok(())
    }

    /// Identify a board by MAC address.
    pub async fn identify(&self, mac_address: &str) -> RegistryResult<DeviceIdentification> {
        let body = IdentifyRequest {
            mac_address: mac_address.to_string(),
        };
        let request = self.request(Method::POST, "/api/devices/identify").json(&body);
        let response: IdentificationResponse = send(request).await?;
        Ok(response.identification)
    }

    /// Best-effort identification.
    ///
    /// If the service is unreachable the generic unregistered payload is
    /// returned so the flashing flow can carry on.
    pub async fn identify_or_default(&self, mac_address: &str) -> DeviceIdentification {
        match self.identify(mac_address).await {
            Ok(identification) => identification,
            Err(e) => {
                warn!("Device identification failed, using generic info: {}", e);
                DeviceIdentification::unregistered()
            }
        }
    }

    /// Recent access log entries, newest first.
    pub async fn access_logs(
        &self,
        identifier: Option<&str>,
        limit: Option<usize>,
    ) -> RegistryResult<Vec<AccessLogEntry>> {
        let mut request = self.request(Method::GET, "/api/access-logs");
        if let Some(identifier) = identifier {
            request = request.query(&[("identifier", identifier)]);
        }
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        let response: AccessLogsResponse = send(request).await?;
        Ok(response.logs)
    }

    /// Service health.
    pub async fn health(&self) -> RegistryResult<HealthResponse> {
        send(self.request(Method::GET, "/api/health")).await
    }

    // --- Internal helpers ---

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    fn device_request(
        &self,
        method: Method,
        device_id: &str,
        action: Option<&str>,
    ) -> RegistryResult<RequestBuilder> {
        let url = device_url(&self.base_url, device_id, action)?;
        Ok(self.client.request(method, url))
    }
}

/// `{base}/api/devices/{device_id}[/{action}]`, with the id encoded as a
/// single path segment so `/` or `?` in it cannot reach another route.
fn device_url(base_url: &str, device_id: &str, action: Option<&str>) -> RegistryResult<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| RegistryError::Transport(format!("Invalid server URL: {}", e)))?;

    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            RegistryError::Transport(format!("Invalid server URL: {}", base_url))
        })?;
        segments
            .pop_if_empty()
            .extend(["api", "devices", device_id])
            .extend(action);
    }

    Ok(url)
}

fn sort_param(sort: DeviceSort) -> &'static str {
    match sort {
        DeviceSort::LastSeenDesc => "last_seen_desc",
        DeviceSort::ChipType => "chip_type",
        DeviceSort::DeviceId => "device_id",
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> RegistryResult<T> {
    let resp = request.send().await.map_err(classify_transport_error)?;

    let status = resp.status();
    if status.is_success() {
        return resp
            .json()
            .await
            .map_err(|e| RegistryError::Transport(format!("Invalid response: {}", e)));
    }

    let body = resp.text().await.unwrap_or_default();
    Err(error_for_status(status, &body))
}

fn classify_transport_error(e: reqwest::Error) -> RegistryError {
    if e.is_connect() || e.is_timeout() {
        RegistryError::TransientUnavailable(e.to_string())
    } else {
        RegistryError::Transport(e.to_string())
    }
}

fn error_for_status(status: StatusCode, body: &str) -> RegistryError {
    let message = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => match err.details {
            Some(details) => format!("{}: {}", err.error, details),
            None => err.error,
        },
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => body.to_string(),
    };

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            RegistryError::Validation(message)
        }
        StatusCode::NOT_FOUND => RegistryError::NotFound(message),
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            RegistryError::TransientUnavailable(message)
        }
        _ => RegistryError::Transport(format!("Server error {}: {}", status, message)),
    }
}
