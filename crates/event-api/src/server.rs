//! Axum server and routes.

use crate::mapper::{map_create_admin_event, map_create_event, MapError};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use event_types::{
    CreateAdminEventRequest, CreateEventRequest, CreateResponse, ErrorResponse, EventProvider,
    RecordKind, ServiceError,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub provider: Arc<dyn EventProvider>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/events", post(handle_create_event))
        .route("/v1/admin-events", post(handle_create_admin_event))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("can't get request object: {0}")]
    Malformed(#[from] JsonRejection),
    #[error("can't get request object: {0}")]
    Invalid(#[from] MapError),
    #[error("{}: {}", kind_label(.source.kind()), .source)]
    Push {
        #[from]
        source: ServiceError,
    },
}

fn kind_label(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Event => "event",
        RecordKind::AdminEvent => "admin event",
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Malformed(_) | ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::Push { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = ErrorResponse {
            code: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn handle_create_event(
    State(state): State<Arc<AppState>>,
    req: Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<Json<CreateResponse>, ApiError> {
    let Json(req) = req?;
    let event = map_create_event(req)?;
    let id = event.id;
    state.provider.push(event).await?;
    tracing::debug!(%id, "event accepted");
    Ok(Json(CreateResponse {}))
}

async fn handle_create_admin_event(
    State(state): State<Arc<AppState>>,
    req: Result<Json<CreateAdminEventRequest>, JsonRejection>,
) -> Result<Json<CreateResponse>, ApiError> {
    let Json(req) = req?;
    let event = map_create_admin_event(req)?;
    let id = event.id;
    state.provider.push_admin(event).await?;
    tracing::debug!(%id, "admin event accepted");
    Ok(Json(CreateResponse {}))
}

async fn handle_health() -> &'static str {
    "ok"
}
