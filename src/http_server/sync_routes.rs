//! Sync HTTP Routes
//!
//! Filter staging and the two server-sent-event streams.
//!
//! - `POST /sse` - stage a JSON filter, respond with the token as plain text
//! - `GET /sse/count` - stream the filtered total
//! - `GET /sse?position&size` - stream one window of the filtered set
//!
//! Stream requests carry the token in `X-Request-Id`. A missing, unknown
//! or expired token is answered with 403 and a plain-text reason.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Query as QueryParams, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Router,
};
use futures_util::StreamExt;

use crate::observability::{log_event_at, Event, Severity};
use crate::records::OrderFilter;
use crate::sync::{
    token_prefix, FilterStagingCache, Query, SessionStream, StreamSessionHandler, SyncError, WindowRequest,
    REQUEST_ID_HEADER,
};

// ==================
// Shared State
// ==================

/// Sync state shared across handlers
pub struct SyncState {
    pub staging: Arc<FilterStagingCache>,
    pub sessions: StreamSessionHandler,
    pub default_window_size: u64,
    pub keep_alive: Duration,
}

// ==================
// Sync Routes
// ==================

/// Create sync routes; mounted under the resource path (`/orders`)
pub fn sync_routes(state: Arc<SyncState>) -> Router {
    Router::new()
        .route("/sse", post(stage_handler).get(window_handler))
        .route("/sse/count", get(count_handler))
        .with_state(state)
}

// ==================
// Handlers
// ==================

/// Stage a filter. The body is decoded regardless of content type.
async fn stage_handler(State(state): State<Arc<SyncState>>, body: Bytes) -> Response {
    let filter: OrderFilter = match serde_json::from_slice(&body) {
        Ok(filter) => filter,
        Err(e) => return error_response(SyncError::InvalidFilter(e.to_string())),
    };

    let token = state.staging.stage(filter);
    log_event_at(Severity::Debug, Event::FilterStaged, &[("token", token_prefix(&token))]);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        token,
    )
        .into_response()
}

/// Stream the filtered count
async fn count_handler(State(state): State<Arc<SyncState>>, headers: HeaderMap) -> Response {
    match state.sessions.open(request_id(&headers), Query::Count) {
        Ok(session) => event_stream(session, state.keep_alive),
        Err(e) => error_response(e),
    }
}

/// Stream one window of the filtered set
async fn window_handler(
    State(state): State<Arc<SyncState>>,
    headers: HeaderMap,
    QueryParams(params): QueryParams<HashMap<String, String>>,
) -> Response {
    let window = WindowRequest::from_params_or(
        params.get("position").map(String::as_str),
        params.get("size").map(String::as_str),
        state.default_window_size,
    );

    match state.sessions.open(request_id(&headers), Query::Window(window)) {
        Ok(session) => event_stream(session, state.keep_alive),
        Err(e) => error_response(e),
    }
}

// ==================
// Helpers
// ==================

/// Token from the request header; blank counts as missing
fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// One `data:` event per delivered result. A failed recomputation ends the
/// body with an error, which aborts the connection.
fn event_stream(session: SessionStream, keep_alive: Duration) -> Response {
    let events = session.map(|item| -> Result<SseEvent, SyncError> {
        let recomputed = item?;
        let payload = recomputed.result.to_payload()?;
        Ok(SseEvent::default().data(payload))
    });

    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(keep_alive))
        .into_response()
}

fn error_response(e: SyncError) -> Response {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, e.to_string()).into_response()
}
