//! `/health`, `/ready`, `/liveness`: unauthenticated flat status endpoints.
//! These report "the process is up" and, for `/ready`, "the Docker client
//! can be reached" when PTC or standalone execution is enabled — never "the
//! upstream model is healthy".

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
}

pub async fn health() -> Response {
    (StatusCode::OK, Json(StatusBody { status: "ok" })).into_response()
}

pub async fn liveness() -> Response {
    (StatusCode::OK, Json(StatusBody { status: "alive" })).into_response()
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    docker_available: Option<bool>,
}

pub async fn ready(State(state): State<AppState>) -> Response {
    let docker_available = match (&state.ptc, &state.codeexec) {
        (None, None) => None,
        (ptc, codeexec) => {
            let mut available = true;
            if let Some(ptc) = ptc {
                available &= ptc.is_docker_available().await;
            }
            if let Some(codeexec) = codeexec {
                available &= codeexec.is_docker_available().await;
            }
            Some(available)
        }
    };

    let status = if docker_available == Some(false) { "degraded" } else { "ready" };

    (StatusCode::OK, Json(ReadyBody { status, docker_available })).into_response()
}
