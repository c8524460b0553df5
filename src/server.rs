//! HTTP endpoint exposing the pipeline.
//!
//! - `POST /get-sar-image` with `{"latitude": .., "longitude": ..}`
//! - `GET /image/:id` serves an enhanced PNG
//! - `GET /health`

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::core::pipeline::{PipelineFailure, PipelineOrchestrator, PipelineResult, PipelineStage};
use crate::io::ArtifactId;
use crate::types::{GeoPoint, Metadata, SarError, SarResult};

pub const SUCCESS_MESSAGE: &str = "SAR image processed and ready for model";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PipelineOrchestrator>,
}

impl AppState {
    pub fn new(pipeline: PipelineOrchestrator) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinateRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl CoordinateRequest {
    /// Validate into a point; `0.0` counts as a real coordinate
    pub fn into_point(self) -> SarResult<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => GeoPoint::new(latitude, longitude),
            _ => Err(SarError::Validation("Latitude and longitude are required.".to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SarImageResponse {
    pub message: String,
    pub shape: [usize; 4],
    pub image_id: String,
    pub image_url: String,
    pub metadata: Option<Metadata>,
}

impl From<&PipelineResult> for SarImageResponse {
    fn from(result: &PipelineResult) -> Self {
        Self {
            message: SUCCESS_MESSAGE.to_string(),
            shape: result.tensor_shape,
            image_id: result.artifact_id.to_string(),
            image_url: format!("/image/{}", result.artifact_id),
            metadata: result.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn error_response(error: &SarError, stage: Option<String>) -> Response {
    let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let details = match error {
        SarError::Request { body, .. } => Some(body.clone()),
        _ => None,
    };
    let body = ErrorResponse {
        error: error.to_string(),
        stage,
        details,
    };
    (status, Json(body)).into_response()
}

// Bad input never leaves the start stage
fn rejected_input(error: &SarError) -> Response {
    log::warn!("Rejected request: {}", error);
    error_response(error, Some(PipelineStage::Start.to_string()))
}

fn failure_response(failure: &PipelineFailure) -> Response {
    log::error!("{}", failure);
    error_response(&failure.cause, Some(failure.stage.to_string()))
}

// ============================================================================
// Handlers
// ============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/get-sar-image", post(get_sar_image))
        .route("/image/:id", get(serve_image))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn get_sar_image(
    State(state): State<AppState>,
    payload: Result<Json<CoordinateRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let error = SarError::Validation(rejection.body_text());
            return rejected_input(&error);
        }
    };

    let point = match request.into_point() {
        Ok(point) => point,
        Err(error) => return rejected_input(&error),
    };

    // The pipeline does blocking I/O
    let pipeline = state.pipeline.clone();
    match tokio::task::spawn_blocking(move || pipeline.run(&point)).await {
        Ok(Ok(result)) => Json(SarImageResponse::from(&result)).into_response(),
        Ok(Err(failure)) => failure_response(&failure),
        Err(e) => {
            log::error!("Pipeline task panicked: {}", e);
            let body = ErrorResponse {
                error: "Internal error while processing the request".to_string(),
                stage: None,
                details: None,
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

async fn serve_image(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match ArtifactId::parse(&id) {
        Ok(id) => id,
        Err(error) => return error_response(&error, None),
    };

    match state.pipeline.store().read_enhanced(&id) {
        Ok(Some(bytes)) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Ok(None) => {
            let body = ErrorResponse {
                error: format!("No image with id {}", id),
                stage: None,
                details: None,
            };
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        }
        Err(error) => error_response(&error, None),
    }
}

async fn health() -> &'static str {
    "ok"
}
