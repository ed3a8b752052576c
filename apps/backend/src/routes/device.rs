//! Device registration and status endpoints

use axum::{extract::State, Extension, Json};

use crate::error::{ApiError, Result};
use crate::models::{DeviceRegisterRequest, DeviceRegisterResponse, DeviceStatusResponse};
use crate::routes::auth::AuthenticatedDevice;
use crate::AppState;

/// POST /api/device/register
///
/// Issues a fresh device token. The body is optional.
pub async fn register(
    State(state): State<AppState>,
    payload: Option<Json<DeviceRegisterRequest>>,
) -> Result<Json<DeviceRegisterResponse>> {
    let name = payload.and_then(|Json(p)| p.name);
    let device = state.db.create_device(name.as_deref()).await?;

    tracing::info!(device_id = %device.id, "registered device");

    Ok(Json(DeviceRegisterResponse {
        device_id: device.id,
        token: device.token,
    }))
}

/// GET /api/device/status
pub async fn status(
    Extension(auth): Extension<AuthenticatedDevice>,
    State(state): State<AppState>,
) -> Result<Json<DeviceStatusResponse>> {
    state
        .db
        .get_device_by_token(&auth.token)
        .await?
        .map(|device| Json(DeviceStatusResponse::from(device)))
        .ok_or(ApiError::DeviceNotFound(auth.device_id))
}
