//! Bearer-token authentication for the document routes

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::AppState;

/// Routes reachable without a device token
const PUBLIC_PATHS: [&str; 2] = ["/health", "/api/device/register"];

/// Device resolved from the bearer token, stored in request extensions
#[derive(Clone, Debug)]
pub struct AuthenticatedDevice {
    pub device_id: Uuid,
    pub token: String,
}

fn bearer_token(headers: &HeaderMap) -> Result<String> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    match header.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(ApiError::Unauthorized(
            "Invalid Authorization format".to_string(),
        )),
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let token = bearer_token(request.headers())?;

    let Some(device) = state.db.get_device_by_token(&token).await? else {
        tracing::warn!(path = %request.uri().path(), "rejected unknown device token");
        return Err(ApiError::Unauthorized("Invalid device token".to_string()));
    };

    state.db.update_last_seen(device.id).await?;

    request.extensions_mut().insert(AuthenticatedDevice {
        device_id: device.id,
        token,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extracted() {
        assert_eq!(bearer_token(&headers("Bearer abc-123")).unwrap(), "abc-123");
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_wrong_scheme_or_empty_token() {
        for value in ["abc-123", "Basic abc", "Bearer ", "Bearer    "] {
            assert!(bearer_token(&headers(value)).is_err(), "{value}");
        }
    }
}
