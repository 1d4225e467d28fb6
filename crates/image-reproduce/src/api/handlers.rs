use axum::{
    Json,
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use futures::Stream;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::assets::{ModelRegistry, PromptPair, load_models, load_prompt_pair};
use crate::error::{ReproduceError, Result};
use crate::image::{ImageGenerator, fetch_random_image};
use crate::relay::{self, Frame};
use crate::upstream::ChatRequest;

use super::server::AppState;
use super::types::{AnalyzeRequest, GenerateRequest, ImageResponse};

/// Health check endpoint - returns JSON status
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Default prompt templates, reloaded from disk on every call
pub async fn prompts_handler(State(state): State<Arc<AppState>>) -> Result<Json<PromptPair>> {
    let pair = load_prompt_pair(&state.config.assets.prompts_dir).await?;
    Ok(Json(pair))
}

pub async fn models_handler(State(state): State<Arc<AppState>>) -> Result<Json<ModelRegistry>> {
    let registry = load_models(&state.config.assets.models_file).await?;
    Ok(Json(registry))
}

pub async fn random_image_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ImageResponse>> {
    let image = fetch_random_image(
        &state.http,
        &state.config.random_image.url,
        state.upstream_timeout,
    )
    .await?;
    Ok(Json(ImageResponse { image }))
}

/// Stream an image analysis back as Server-Sent-Events
///
/// A missing credential is a plain 500. Any other failure to open the
/// upstream stream becomes a single error frame.
pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    let request_id = Uuid::new_v4();
    let model = request
        .model
        .unwrap_or_else(|| state.config.analysis.default_model.clone());
    let span = tracing::info_span!("analyze", %request_id, model = %model);

    let chat = ChatRequest::image_analysis(
        model,
        request.system_prompt,
        request.user_prompt,
        request.image,
    );

    let opened = state.upstream.stream_chat(&chat).instrument(span.clone()).await;

    span.in_scope(|| match opened {
        Ok(upstream) => {
            tracing::info!("Relaying upstream stream");
            event_stream(relay::relay(upstream))
        }
        Err(e @ ReproduceError::Configuration(_)) => e.into_response(),
        Err(e) => {
            tracing::error!(error_type = e.category(), "Failed to open upstream stream: {e}");
            event_stream(relay::error_frame(e.to_string()))
        }
    })
}

pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<ImageResponse>> {
    let request_id = Uuid::new_v4();
    let model = request
        .model
        .unwrap_or_else(|| state.config.generation.default_model.clone());
    let span = tracing::info_span!("generate", %request_id, model = %model);

    let generator = ImageGenerator::new(state.upstream.clone(), state.config.generation.max_retries);
    let image = generator
        .generate(&model, &request.prompt)
        .instrument(span)
        .await?;

    Ok(Json(ImageResponse { image: image.url }))
}

fn event_stream<S>(frames: S) -> Response
where
    S: Stream<Item = Frame> + Send + 'static,
{
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(relay::encode_frames(frames)),
    )
        .into_response()
}
