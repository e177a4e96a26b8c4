//! Caller identity extractors.
//!
//! The `X-Member-ID` / `X-Admin-ID` headers are set by the authenticating
//! gateway after verifying the caller; they are only trusted because the
//! service is not reachable except through it.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

/// Identity of the authenticated member making the request.
#[derive(Debug, Clone, Copy)]
pub struct MemberId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for MemberId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("X-Member-ID")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Missing X-Member-ID header")))?;

        let member_id = raw
            .parse::<Uuid>()
            .map_err(|_| AppError::AuthError(anyhow::anyhow!("Malformed X-Member-ID header")))?;

        tracing::debug!(member_id = %member_id, "Member identity extracted");

        Ok(MemberId(member_id))
    }
}

/// Identity of the authenticated administrator making the request.
#[derive(Debug, Clone)]
pub struct AdminId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AdminId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin_id = parts
            .headers
            .get("X-Admin-ID")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Missing X-Admin-ID header")))?;

        tracing::debug!(admin_id = admin_id, "Administrator identity extracted");

        Ok(AdminId(admin_id.to_string()))
    }
}
