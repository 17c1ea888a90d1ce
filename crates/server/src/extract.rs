//! Request-body extractor shared by every JSON route: enforces
//! `Content-Type: application/json`, caps the body at Anthropic's own 32 MiB
//! limit, and parses with `sonic_rs`. Adapted from the upstream Anthropic
//! proxy's `Extract<T>`, minus the authentication-context plumbing this
//! server doesn't carry.

use axum::body::{Body, Bytes};
use axum::extract::FromRequest;
use axum::response::Response;
use serde::de::DeserializeOwned;

use crate::error_mapping::bad_request_error;

/// Body limit Anthropic itself enforces on `/v1/messages`.
const BODY_LIMIT_BYTES: usize = 32 << 20;

/// A deserialized JSON body, plus the raw bytes it came from (handlers that
/// need to re-derive a request id or log payload size can use `.1` without
/// re-serializing).
pub struct Extract<T>(pub T, #[allow(dead_code)] pub Bytes);

impl<S, T: DeserializeOwned> FromRequest<S> for Extract<T>
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(request: http::Request<Body>, _state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = request.into_parts();

        static APPLICATION_JSON: http::HeaderValue = http::HeaderValue::from_static("application/json");
        if parts.headers.get(http::header::CONTENT_TYPE).is_none_or(|value| value != APPLICATION_JSON) {
            return Err(bad_request_error("Unsupported Content-Type, expected: 'Content-Type: application/json'"));
        }

        let bytes = axum::body::to_bytes(body, BODY_LIMIT_BYTES).await.map_err(|err| {
            let source = std::error::Error::source(&err);
            if source.is_some_and(|source| source.is::<http_body_util::LengthLimitError>()) {
                bad_request_error(format!("Request body is too large, limit is {BODY_LIMIT_BYTES} bytes"))
            } else {
                bad_request_error(format!("Failed to read request body: {err}"))
            }
        })?;

        let body = sonic_rs::from_slice(&bytes).map_err(|err| bad_request_error(format!("Failed to parse request body: {err}")))?;

        Ok(Extract(body, bytes))
    }
}
