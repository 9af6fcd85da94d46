//! Device registration, lookup and lifecycle handlers.

use crate::error::ApiError;
use crate::state::{AppState, UNREGISTERED};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use sense360_core::api::{
    DeviceResponse, DevicesResponse, IdentificationResponse, IdentifyRequest, ListDevicesQuery,
    MessageResponse,
};
use sense360_core::{AccessType, DeviceKey, RegisterDevice, RegistryError, RegistryResult};

pub async fn register_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RegisterDevice>, JsonRejection>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let result = payload
        .map_err(|rejection| RegistryError::Validation(rejection.body_text()))
        .and_then(|Json(input)| state.registry.register_device(input));

    match result {
        Ok(device) => {
            state.record_access(device.device_id(), AccessType::Register, Ok(()), &headers);
            Ok(Json(DeviceResponse {
                success: true,
                device,
                message: Some("Device registered successfully".to_string()),
            }))
        }
        Err(e) => {
            tracing::warn!("Device registration rejected: {}", e);
            state.record_access(UNREGISTERED, AccessType::Register, Err(e.to_string()), &headers);
            Err(e.into())
        }
    }
}

pub async fn identify_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<IdentifyRequest>, JsonRejection>,
) -> Result<Json<IdentificationResponse>, ApiError> {
    let Json(req) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let identification = sense360_core::identify_device(&state.registry, &req.mac_address);

    let identifier = state
        .registry
        .get_device_by_mac(&req.mac_address)
        .map(|record| record.public_id().to_string());
    state.record_access(
        identifier.as_deref().unwrap_or(UNREGISTERED),
        AccessType::Identify,
        Ok(()),
        &headers,
    );

    Ok(Json(IdentificationResponse {
        success: true,
        identification,
    }))
}

/// Fetch a device by public id and record that it was seen.
pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DeviceResponse>, ApiError> {
    let device = record(
        &state,
        &headers,
        &device_id,
        AccessType::Lookup,
        state.registry.get_device_by_id(&device_id),
    )?;

    state.registry.touch_last_seen(DeviceKey::PublicId(&device_id));

    Ok(Json(DeviceResponse {
        success: true,
        device,
        message: None,
    }))
}

pub async fn list_devices(
    State(state): State<AppState>,
    query: Result<Query<ListDevicesQuery>, QueryRejection>,
) -> Result<Json<DevicesResponse>, ApiError> {
    let Query(query) = query.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let devices = match query.sort {
        Some(sort) => state.registry.list_active_devices_sorted(sort),
        None => state.registry.list_active_devices(),
    };

    Ok(Json(DevicesResponse {
        success: true,
        count: devices.len(),
        devices,
    }))
}

pub async fn ping_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    record(
        &state,
        &headers,
        &device_id,
        AccessType::Ping,
        state.registry.ping(&device_id),
    )?;

    Ok(Json(MessageResponse::ok("Device activity updated")))
}

pub async fn deactivate_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    record(
        &state,
        &headers,
        &device_id,
        AccessType::Deactivate,
        state.registry.deactivate(&device_id),
    )?;

    Ok(Json(MessageResponse::ok("Device deactivated successfully")))
}

fn record<T>(
    state: &AppState,
    headers: &HeaderMap,
    device_id: &str,
    access_type: AccessType,
    result: RegistryResult<T>,
) -> RegistryResult<T> {
    let outcome = result.as_ref().map(|_| ()).map_err(|e| e.to_string());
    state.record_access(device_id, access_type, outcome, headers);
    result
}
