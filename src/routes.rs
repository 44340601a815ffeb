use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    config::Config,
    decode::{self, DecodeError},
    diffusion::{DiffusionClient, DiffusionError},
    models::{EditRequest, ErrorResponse, GenerateRequest},
    replicate::{ReplicateClient, ReplicateError},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub replicate: Arc<ReplicateClient>,
    pub diffusion: Arc<DiffusionClient>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let replicate = Arc::new(ReplicateClient::new(&config));
        let diffusion = Arc::new(DiffusionClient::new(config.diffusion_base_url.clone()));
        Self {
            config: Arc::new(config),
            replicate,
            diffusion,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/edit", post(edit))
        .route("/generate", post(generate))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Every failure in either pipeline collapses into one atomic outcome:
/// a 500 with `{ "error": <message> }`.
pub struct ApiError(String);

/// Json extractor whose rejection (missing key, bad JSON) also lands in the
/// uniform `{ "error": ... }` shape instead of axum's default 422.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: self.0 }),
        )
            .into_response()
    }
}

impl From<DecodeError> for ApiError {
    fn from(e: DecodeError) -> Self {
        ApiError(e.to_string())
    }
}

impl From<ReplicateError> for ApiError {
    fn from(e: ReplicateError) -> Self {
        ApiError(e.to_string())
    }
}

impl From<DiffusionError> for ApiError {
    fn from(e: DiffusionError) -> Self {
        ApiError(e.to_string())
    }
}

fn png_response(bytes: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], bytes).into_response()
}

pub async fn edit(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<EditRequest>,
) -> Result<Response, ApiError> {
    tracing::info!("🎨 Edit request: {}", body.prompt);

    let artifacts = match decode::write_artifacts(&state.config.temp_dir, &body.image, &body.mask) {
        Ok(artifacts) => artifacts,
        Err(e) => {
            tracing::error!("❌ Error in edit route: {}", e);
            return Err(e.into());
        }
    };

    let result = state
        .replicate
        .inpaint(&artifacts.image_path, &artifacts.mask_path, &body.prompt)
        .await;

    // Artifacts go away on success and failure alike.
    decode::cleanup_artifacts(&artifacts);

    match result {
        Ok(bytes) => {
            tracing::info!("✅ Successfully received edited image");
            Ok(png_response(bytes))
        }
        Err(e) => {
            tracing::error!("❌ Error in edit route: {}", e);
            Err(e.into())
        }
    }
}

pub async fn generate(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<GenerateRequest>,
) -> Result<Response, ApiError> {
    tracing::info!("🎨 Generate request: {}", body.prompt);

    match state.diffusion.txt2img(&body).await {
        Ok(bytes) => Ok(png_response(bytes)),
        Err(e) => {
            tracing::error!("❌ Error in generate route: {}", e);
            Err(e.into())
        }
    }
}
