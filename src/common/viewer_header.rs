use crate::common::error::{AppError, ServiceResult};
use crate::models::viewers::Viewer;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::str::FromStr;

/// Set by the gateway in front of the service once the session is verified
pub const VIEWER_HEADER: &str = "X-Viewer-Id";

pub struct ViewerInfo {
    pub viewer: Viewer,
}

fn get_viewer(parts: &Parts) -> ServiceResult<ViewerInfo> {
    let Some(header) = parts.headers.get(VIEWER_HEADER) else {
        return Err(AppError::SessionsSignedOut);
    };
    let user_id = header
        .to_str()
        .ok()
        .and_then(|value| i64::from_str(value.trim()).ok())
        .ok_or(AppError::Unauthorized)?;
    Ok(ViewerInfo {
        viewer: Viewer::new(user_id),
    })
}

impl<S: Sync + Send> FromRequestParts<S> for ViewerInfo {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        get_viewer(parts)
    }
}
