//! `POST /v1/messages/count_tokens`, `GET /v1/models`, `GET /v1/models/{id}`.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use llm::bedrock::{ModelSummary, TokenCountKind};
use llm::protocol::anthropic::messages::Request;
use serde::Serialize;

use crate::extract::Extract;
use crate::state::AppState;

#[derive(Serialize)]
struct CountTokensResponse {
    input_tokens: u32,
    /// `true` when this deployment fell back to the CJK-weighted estimator
    /// rather than Bedrock's own `CountTokens` operation (always the case
    /// for non-Claude-family models). Not part of the upstream Anthropic
    /// contract; present so callers don't silently trust an approximation.
    is_estimate: bool,
}

pub async fn count_tokens(State(state): State<AppState>, Extract(request, _bytes): Extract<Request>) -> Response {
    let resolved_model_id = state.model_mapping.resolve(&request.model).to_string();

    match state.bedrock.count_tokens(&request, &resolved_model_id).await {
        Ok(count) => {
            let body = CountTokensResponse { input_tokens: count.input_tokens, is_estimate: count.kind == TokenCountKind::Estimated };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

#[derive(Serialize)]
struct ModelListResponse {
    data: Vec<ModelSummary>,
    has_more: bool,
}

pub async fn list_models(State(state): State<AppState>) -> Response {
    match state.bedrock.list_models().await {
        Ok(models) => (StatusCode::OK, Json(ModelListResponse { data: models, has_more: false })).into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn get_model(State(state): State<AppState>, Path(model_id): Path<String>) -> Response {
    match state.bedrock.list_models().await {
        Ok(models) => match models.into_iter().find(|model| model.id == model_id) {
            Some(model) => (StatusCode::OK, Json(model)).into_response(),
            None => llm::bedrock::model_not_found(&model_id).into_response(),
        },
        Err(error) => error.into_response(),
    }
}
