use crate::common::error::AppError;
use crate::common::init;
use crate::common::state::AppState;
use crate::common::viewer_header::ViewerInfo;
use crate::models::viewers::Viewer;
use crate::settings::AppSettings;
use axum::Router;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tokio::net::TcpListener;
use tracing::info;

pub mod v1;

/// Everything a handler needs: the backend and who is asking
pub struct RequestContext {
    pub state: AppState,
    pub viewer: Viewer,
}

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/v1", v1::router())
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let viewer_info = ViewerInfo::from_request_parts(parts, state).await?;
        Ok(Self {
            state: state.clone(),
            viewer: viewer_info.viewer,
        })
    }
}

pub async fn serve(settings: &AppSettings) -> anyhow::Result<()> {
    let state = init::initialize_state(settings).await?;
    let app = router().with_state(state);

    let listener = TcpListener::bind((settings.app_host, settings.app_port)).await?;
    info!(
        host = %settings.app_host,
        port = settings.app_port,
        "Serving the TravelShare chat API"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
