//! HTTP routing.
//!
//! All actions live under one wildcard route below the base path; the first
//! path segment selects the action and is matched case-insensitively.
//!
//! ```text
//! GET  {base}keygen/{keytype}?filename=&version=
//! GET  {base}resname/{name}
//! POST {base}insert/{key}[/{filename...}]?priority=&realtime=
//! POST {base}regname                       body: {"name","requestKey"}
//! ```
//!
//! Inserts and resolver exchanges block until the network or plugin
//! answers, so they run on the blocking pool.

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use frest_keys::{DerivedKeyPair, KeyType};
use frest_network::Priority;
use frest_services::{parse_realtime, InsertRequest};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::GatewayError;
use crate::state::AppState;

/// Build the gateway router.
pub fn build_router(state: AppState) -> Router {
    let route = format!("{}{{*rest}}", state.config.base_path);
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route(&route, get(handle_get).post(handle_post))
        .fallback(handle_fallback)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_body_bytes))
                .layer(middleware::from_fn(add_headers)),
        )
        .with_state(state)
}

type Params = HashMap<String, String>;

/// Split the wildcard part of the path into action and arguments.
fn split_action(rest: &str) -> Result<(String, Vec<&str>), GatewayError> {
    let mut segments = rest.split('/');
    let action = segments
        .next()
        .filter(|action| !action.is_empty())
        .ok_or_else(GatewayError::bad_request)?;
    Ok((action.to_ascii_lowercase(), segments.collect()))
}

fn required_segment<'a>(segments: &[&'a str], index: usize) -> Result<&'a str, GatewayError> {
    segments
        .get(index)
        .copied()
        .filter(|segment| !segment.is_empty())
        .ok_or_else(GatewayError::bad_request)
}

async fn handle_get(
    State(state): State<AppState>,
    Path(rest): Path<String>,
    Query(params): Query<Params>,
) -> Result<Response, GatewayError> {
    let (action, segments) = split_action(&rest)?;
    match action.as_str() {
        "keygen" => keygen(&state, &segments, &params),
        "resname" => resname(&state, &segments).await,
        _ => Err(GatewayError::UnsupportedAction),
    }
}

async fn handle_post(
    State(state): State<AppState>,
    Path(rest): Path<String>,
    Query(params): Query<Params>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let (action, segments) = split_action(&rest)?;
    match action.as_str() {
        "insert" => insert(&state, &segments, &params, &headers, body).await,
        "regname" => regname(&state, &body).await,
        _ => Err(GatewayError::UnsupportedAction),
    }
}

async fn handle_fallback() -> GatewayError {
    GatewayError::bad_request()
}

// =============================================================================
// keygen
// =============================================================================

fn keygen(state: &AppState, segments: &[&str], params: &Params) -> Result<Response, GatewayError> {
    let key_type: KeyType = required_segment(segments, 0)?.parse()?;
    let name = params.get("filename").map(String::as_str).unwrap_or("");
    let version = match params.get("version").map(|v| v.trim()) {
        None | Some("") => None,
        Some(version) => Some(
            version
                .parse::<u32>()
                .map_err(|_| GatewayError::bad_request())?,
        ),
    };

    let pair: DerivedKeyPair = state.keys.derive(key_type, name, version);
    info!(key_type = %key_type, name, ?version, "key pair generated");
    Ok(Json(pair).into_response())
}

// =============================================================================
// insert
// =============================================================================

#[derive(Serialize)]
struct InsertResponse {
    #[serde(rename = "requestURI")]
    request_uri: String,
}

async fn insert(
    state: &AppState,
    segments: &[&str],
    params: &Params,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let key = required_segment(segments, 0)?;
    let filename = segments.get(1..).unwrap_or_default().join("/");
    let priority = Priority::from_param(params.get("priority").map(String::as_str).unwrap_or(""))?;
    let realtime = parse_realtime(params.get("realtime").map(String::as_str));
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let request = InsertRequest::new(key, filename, body)
        .with_content_type(content_type)
        .with_priority(priority)
        .with_realtime(realtime);

    let inserts = state.inserts.clone();
    let timeout = state.config.insert_timeout;
    let uri = tokio::task::spawn_blocking(move || inserts.submit(request)?.wait(timeout)).await??;

    Ok(Json(InsertResponse {
        request_uri: uri.to_string(),
    })
    .into_response())
}

// =============================================================================
// resname / regname
// =============================================================================

async fn resname(state: &AppState, segments: &[&str]) -> Result<Response, GatewayError> {
    let name = required_segment(segments, 0)?.to_string();
    let resolver = state.resolver.clone();
    let json = tokio::task::spawn_blocking(move || resolver.resolve(&name)).await??;

    Ok((
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        json,
    )
        .into_response())
}

#[derive(Deserialize)]
struct RegnameBody {
    name: String,
    #[serde(rename = "requestKey")]
    request_key: String,
}

#[derive(Serialize)]
struct RegnameResponse {
    #[serde(rename = "resolveURI")]
    resolve_uri: String,
}

async fn regname(state: &AppState, body: &[u8]) -> Result<Response, GatewayError> {
    let RegnameBody { name, request_key } =
        serde_json::from_slice(body).map_err(GatewayError::json_decode)?;
    let resolver = state.resolver.clone();
    let resolve_uri =
        tokio::task::spawn_blocking(move || resolver.register(&name, &request_key)).await??;

    Ok(Json(RegnameResponse { resolve_uri }).into_response())
}

// =============================================================================
// Middleware
// =============================================================================

/// Keys and insert results are per-request; never let them be cached.
async fn add_headers(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
