//! `POST /v1/messages`: dispatches between the plain upstream proxy, the
//! Programmatic Tool Calling orchestrator, and the standalone code-execution
//! orchestrator, depending on what the request's tools and beta headers
//! declare.

use std::convert::Infallible;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::StreamExt as _;
use http::{HeaderMap, HeaderValue, StatusCode};
use llm::protocol::anthropic::messages::{
    Container, Delta, MessageDelta, MessageResponse, Request, StreamEvent, StreamMessageStart, StreamUsage,
};
use uuid::Uuid;

use crate::error_mapping::{self, bad_request_error};
use crate::extract::Extract;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";
const CONTAINER_ID_HEADER: &str = "x-container-id";
const CONTAINER_EXPIRES_HEADER: &str = "x-container-expires-at";

pub async fn messages(State(state): State<AppState>, headers: HeaderMap, Extract(request, _bytes): Extract<Request>) -> Response {
    let request_id = format!("req_{}", Uuid::new_v4().simple());
    let beta_header = beta_header_value(&headers);
    let stream = request.stream.unwrap_or(false);

    let is_ptc = ptc::detect::is_ptc_request(&request, beta_header.as_deref(), state.ptc.is_some());
    let is_standalone = codeexec::detect::is_standalone_request(&request, beta_header.as_deref(), state.codeexec.is_some());

    if is_ptc && is_standalone {
        return with_request_id(
            bad_request_error(
                "request tools mix Programmatic Tool Calling (`allowed_callers` present on some) and standalone \
                 (absent on all) code-execution declarations; pick one engine per request",
            ),
            &request_id,
        );
    }

    let resolved_model_id = state.model_mapping.resolve(&request.model).to_string();

    if is_ptc {
        let ptc = state.ptc.as_ref().expect("is_ptc_request implies state.ptc.is_some()").clone();
        return handle_ptc(&ptc, &state, request, &resolved_model_id, &request_id, stream).await;
    }

    if is_standalone {
        let codeexec = state.codeexec.as_ref().expect("is_standalone_request implies state.codeexec.is_some()").clone();
        return handle_standalone(&codeexec, &state, request, &resolved_model_id, &request_id, stream).await;
    }

    handle_plain(&state, request, &resolved_model_id, &request_id, stream).await
}

async fn handle_plain(state: &AppState, request: Request, resolved_model_id: &str, request_id: &str, stream: bool) -> Response {
    if stream {
        match state.bedrock.invoke_stream(&request, resolved_model_id).await {
            Ok(event_stream) => {
                let sse_stream = event_stream.map(|result| Ok::<_, Infallible>(to_sse_event(result)));
                let mut response = Sse::new(sse_stream).into_response();
                insert_request_id(&mut response, request_id);
                response
            }
            Err(error) => with_request_id(error.into_response(), request_id),
        }
    } else {
        match state.bedrock.invoke(&request, resolved_model_id).await {
            Ok(body) => {
                let mut response = (StatusCode::OK, Json(body)).into_response();
                insert_request_id(&mut response, request_id);
                response
            }
            Err(error) => with_request_id(error.into_response(), request_id),
        }
    }
}

async fn handle_ptc(ptc: &ptc::PtcService, state: &AppState, request: Request, resolved_model_id: &str, request_id: &str, stream: bool) -> Response {
    let outcome = if let Some(answers) = ptc::extract_tool_result_answers(&request) {
        let Some(session_id) = request.container.clone() else {
            return with_request_id(bad_request_error("a tool_result continuation requires a `container`"), request_id);
        };
        ptc.handle_tool_result_continuation(&session_id, answers, request, &state.bedrock, resolved_model_id).await
    } else {
        let container_id = request.container.clone();
        ptc.handle_request(request, &state.bedrock, resolved_model_id, container_id).await
    };

    match outcome {
        Ok(outcome) => execution_response(outcome.response, outcome.container, request_id, stream, false),
        Err(error) => with_request_id(error_mapping::ptc_error_response(error), request_id),
    }
}

async fn handle_standalone(
    codeexec: &codeexec::CodeExecService,
    state: &AppState,
    request: Request,
    resolved_model_id: &str,
    request_id: &str,
    stream: bool,
) -> Response {
    let container_id = request.container.clone();
    let outcome = codeexec.handle_request(request, &state.bedrock, resolved_model_id, container_id).await;

    match outcome {
        Ok(outcome) => execution_response(outcome.response, outcome.container, request_id, stream, true),
        Err(error) => with_request_id(error_mapping::codeexec_error_response(error), request_id),
    }
}

/// Renders a completed PTC/standalone round (these orchestrators never
/// stream token-by-token; the sandbox and upstream calls already happened by
/// the time we get a result) either as a plain JSON body or, when the client
/// asked for `stream:true`, as a single burst of synthetic SSE events
/// replaying the finished message. `X-Container-Expires-At` is only emitted
/// on the standalone path; PTC streaming responses carry `X-Container-ID`
/// alone.
fn execution_response(mut response: MessageResponse, container: Container, request_id: &str, stream: bool, is_standalone: bool) -> Response {
    if stream {
        let events = synthetic_stream_events(&response, &container);
        let sse_stream = futures::stream::iter(events).map(|event| Ok::<_, Infallible>(to_sse_event(Ok(event))));
        let mut http_response = Sse::new(sse_stream).into_response();
        insert_request_id(&mut http_response, request_id);
        insert_header(&mut http_response, CONTAINER_ID_HEADER, &container.id);
        if is_standalone {
            insert_header(&mut http_response, CONTAINER_EXPIRES_HEADER, &container.expires_at);
        }
        http_response
    } else {
        response.container = Some(container);
        let mut http_response = (StatusCode::OK, Json(response)).into_response();
        insert_request_id(&mut http_response, request_id);
        http_response
    }
}

/// Replays a completed message as `message_start` -> one `content_block_start`
/// + `content_block_stop` pair per block (each already carrying its full
/// content, so no delta events are needed) -> `message_delta` -> `message_stop`.
fn synthetic_stream_events(response: &MessageResponse, container: &Container) -> Vec<StreamEvent> {
    let mut events = Vec::with_capacity(response.content.len() * 2 + 3);

    events.push(StreamEvent::MessageStart(Box::new(StreamMessageStart {
        id: response.id.clone(),
        role: response.role.clone(),
        content: Vec::new(),
        model: response.model.clone(),
        usage: StreamUsage {
            input_tokens: Some(response.usage.input_tokens),
            output_tokens: Some(0),
            cache_creation: response.usage.cache_creation.clone(),
            cache_creation_input_tokens: response.usage.cache_creation_input_tokens,
            cache_read_input_tokens: response.usage.cache_read_input_tokens,
            server_tool_use: response.usage.server_tool_use.clone(),
            service_tier: response.usage.service_tier.clone(),
            unknown_fields: Default::default(),
        },
        stop_reason: None,
        stop_sequence: None,
        context_management: None,
        container: Some(container.clone()),
        unknown_fields: Default::default(),
    })));

    for (index, block) in response.content.iter().enumerate() {
        let index = index as u32;
        events.push(StreamEvent::ContentBlockStart { index, content_block: block.clone() });
        events.push(StreamEvent::ContentBlockStop { index });
    }

    events.push(StreamEvent::MessageDelta(Box::new(MessageDelta {
        delta: Delta { stop_reason: response.stop_reason, stop_sequence: response.stop_sequence.clone(), unknown_fields: Default::default() },
        usage: Some(StreamUsage {
            input_tokens: Some(response.usage.input_tokens),
            output_tokens: Some(response.usage.output_tokens),
            cache_creation: response.usage.cache_creation.clone(),
            cache_creation_input_tokens: response.usage.cache_creation_input_tokens,
            cache_read_input_tokens: response.usage.cache_read_input_tokens,
            server_tool_use: response.usage.server_tool_use.clone(),
            service_tier: response.usage.service_tier.clone(),
            unknown_fields: Default::default(),
        }),
        unknown_fields: Default::default(),
    })));

    events.push(StreamEvent::MessageStop);

    events
}

fn to_sse_event(result: llm::Result<StreamEvent>) -> Event {
    let event = match result {
        Ok(event) => event,
        Err(error) => {
            let (_, body) = error.status_and_body();
            StreamEvent::Error { error: body.error }
        }
    };

    Event::default()
        .event(event_name(&event))
        .json_data(&event)
        .unwrap_or_else(|_| Event::default().event("error").data(r#"{"type":"error","error":{"type":"api_error","message":"failed to encode stream event"}}"#))
}

fn event_name(event: &StreamEvent) -> &'static str {
    match event {
        StreamEvent::MessageStart(_) => "message_start",
        StreamEvent::ContentBlockStart { .. } => "content_block_start",
        StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
        StreamEvent::ContentBlockStop { .. } => "content_block_stop",
        StreamEvent::MessageDelta(_) => "message_delta",
        StreamEvent::MessageStop => "message_stop",
        StreamEvent::Ping => "ping",
        StreamEvent::Error { .. } => "error",
        StreamEvent::Unknown(_) => "unknown",
    }
}

/// Joins every `anthropic-beta` header value (clients may repeat the header
/// or comma-join within one) into a single comma-joined string so
/// `ptc::detect`/`codeexec::detect` can do a simple substring search.
fn beta_header_value(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers.get_all("anthropic-beta").iter().filter_map(|value| value.to_str().ok()).collect();

    if values.is_empty() { None } else { Some(values.join(",")) }
}

fn insert_request_id(response: &mut Response, request_id: &str) {
    insert_header(response, REQUEST_ID_HEADER, request_id);
}

fn insert_header(response: &mut Response, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response.headers_mut().insert(name, value);
    }
}

fn with_request_id(mut response: Response, request_id: &str) -> Response {
    insert_request_id(&mut response, request_id);
    response
}
