// crates/nods-server/src/http.rs
// ============================================================================
// Module: HTTP Surface
// Description: axum routes for item queries, category fan-out and catalogue views.
// Purpose: Expose the router over HTTP with per-request deadlines.
// Dependencies: axum, nods-core, nods-providers, serde_json, tokio, tracing
// ============================================================================

//! ## Overview
//! Every query runs the synchronous router on tokio's blocking pool under a
//! [`QueryContext`] with the configured deadline. Dropping the handler future
//! (client disconnect or deadline) cancels the context, so remote providers
//! stop early and the cache does not store the abandoned answer.
//!
//! Inputs come from the query string on GET and from a flat JSON object body
//! on POST (body keys win). Only catalogue lookups that do not resolve
//! (`404`) and rule failures (`400`) change the status; every other outcome
//! is a `200` with a well-typed default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataOutput;
use nods_core::DataUri;
use nods_core::ErrorKind;
use nods_core::NodsError;
use nods_core::QueryContext;
use nods_providers::DataRouter;
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::ServerError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Request parameter selecting the tab-separated fan-out rendering.
pub const CSV_PARAM: &str = "csv";
/// Header carrying the original client address behind proxies.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared handler state.
pub struct AppState {
    /// Query router.
    router: Arc<DataRouter>,
    /// Per-request deadline.
    request_timeout: Duration,
    /// Maximum request body size in bytes.
    max_body_bytes: usize,
}

impl AppState {
    /// Creates handler state.
    #[must_use]
    pub const fn new(router: Arc<DataRouter>, request_timeout: Duration, max_body_bytes: usize) -> Self {
        Self {
            router,
            request_timeout,
            max_body_bytes,
        }
    }
}

// ============================================================================
// SECTION: Routes
// ============================================================================

/// Builds the axum application.
pub fn app(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/healthz", get(health))
        .route("/v1/whoami", get(whoami))
        .route("/v1/nods/{category}", get(category_get).post(category_post))
        .route("/v1/nods/{category}/{vendor}/{item}", get(item_get).post(item_post))
        .route("/v1/catalogue/items", get(catalogue_items))
        .route("/v1/catalogue/items/{category}", get(catalogue_category))
        .route("/v1/catalogue/sources", get(catalogue_sources))
        .route("/v1/catalogue/rules", get(catalogue_rules))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Serves the application on `listener` until ctrl-c.
///
/// # Errors
///
/// Returns [`ServerError::Transport`] when the server fails.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "http listening");
    }
    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| ServerError::Transport(format!("http server failed: {err}")))
}

/// Resolves when the process receives ctrl-c.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Liveness check.
async fn health() -> &'static str {
    "ok"
}

/// `GET /v1/nods/{category}/{vendor}/{item}`.
async fn item_get(
    State(state): State<Arc<AppState>>,
    Path((category, vendor, item)): Path<(String, String, String)>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    item_query(&state, DataUri::from_parts(&category, &vendor, &item), params).await
}

/// `POST /v1/nods/{category}/{vendor}/{item}`.
async fn item_post(
    State(state): State<Arc<AppState>>,
    Path((category, vendor, item)): Path<(String, String, String)>,
    Query(params): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Response {
    match merge_body(params, &body) {
        Ok(params) => item_query(&state, DataUri::from_parts(&category, &vendor, &item), params).await,
        Err(response) => response,
    }
}

/// `GET /v1/nods/{category}`.
async fn category_get(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    category_query(&state, category, params).await
}

/// `POST /v1/nods/{category}`.
async fn category_post(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Response {
    match merge_body(params, &body) {
        Ok(params) => category_query(&state, category, params).await,
        Err(response) => response,
    }
}

/// `GET /v1/whoami`: the `ip` fan-out for the caller's address.
async fn whoami(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let addr = client_addr(&headers, peer);
    let mut params = BTreeMap::new();
    params.insert(Category::Ip.input_key().to_string(), addr.to_string());
    category_query(&state, Category::Ip.as_str().to_string(), params).await
}

/// Lists every catalogue item.
async fn catalogue_items(State(state): State<Arc<AppState>>) -> Response {
    Json(state.router.schema().list_items().to_vec()).into_response()
}

/// Lists the items of one category.
async fn catalogue_category(State(state): State<Arc<AppState>>, Path(category): Path<String>) -> Response {
    match category.parse::<Category>() {
        Ok(category) => Json(state.router.schema().list_items_by_category(category.as_str())).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Lists every source descriptor.
async fn catalogue_sources(State(state): State<Arc<AppState>>) -> Response {
    Json(state.router.schema().list_sources()).into_response()
}

/// Lists every rule item.
async fn catalogue_rules(State(state): State<Arc<AppState>>) -> Response {
    Json(state.router.schema().list_rules_items()).into_response()
}

// ============================================================================
// SECTION: Query Execution
// ============================================================================

/// Runs one item query and renders its output.
async fn item_query(state: &AppState, uri: DataUri, mut params: BTreeMap<String, String>) -> Response {
    params.remove(CSV_PARAM);
    let inputs = to_inputs(params);
    let outcome = run_blocking(state, move |router, ctx| {
        let answer = router.data_value(ctx, &uri, &inputs);
        let status = status_for(answer.error.as_ref());
        (status, DataOutput::new(&uri, &inputs, answer))
    })
    .await;
    match outcome {
        Ok((status, output)) => (status, Json(output)).into_response(),
        Err(response) => response,
    }
}

/// Runs one category fan-out and renders it as JSON or tab-separated text.
async fn category_query(state: &AppState, category: String, mut params: BTreeMap<String, String>) -> Response {
    let csv = params.remove(CSV_PARAM).is_some_and(|value| value.eq_ignore_ascii_case("true"));
    let inputs = to_inputs(params);
    let outcome =
        run_blocking(state, move |router, ctx| router.category_values(ctx, &category, &inputs)).await;
    match outcome {
        Ok(Ok(outputs)) if csv => {
            ([(CONTENT_TYPE, "text/tab-separated-values; charset=utf-8")], render_tsv(&outputs))
                .into_response()
        }
        Ok(Ok(outputs)) => Json(outputs).into_response(),
        Ok(Err(err)) => error_response(&err),
        Err(response) => response,
    }
}

/// Cancels the wrapped context when dropped.
struct CancelOnDrop(QueryContext);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Runs `job` on the blocking pool under the request deadline.
async fn run_blocking<T, F>(state: &AppState, job: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce(&DataRouter, &QueryContext) -> T + Send + 'static,
{
    let ctx = QueryContext::with_timeout(state.request_timeout);
    let guard = CancelOnDrop(ctx.clone());
    let router = Arc::clone(&state.router);
    let task = tokio::task::spawn_blocking(move || job(&router, &ctx));
    let outcome = match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            warn!(error = %err, "query task failed");
            Err(message_response(StatusCode::INTERNAL_SERVER_ERROR, "query failed", "internal"))
        }
        Err(_) => {
            debug!(timeout_ms = state.request_timeout.as_millis(), "query deadline exceeded");
            Err(message_response(StatusCode::GATEWAY_TIMEOUT, "query deadline exceeded", "timeout"))
        }
    };
    drop(guard);
    outcome
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a query error to the transport status.
#[must_use]
pub fn status_for(error: Option<&NodsError>) -> StatusCode {
    match error.map(NodsError::kind) {
        Some(ErrorKind::NotFound) => StatusCode::NOT_FOUND,
        Some(ErrorKind::Rule) => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    }
}

/// Returns the first `X-Forwarded-For` hop, else the peer address.
#[must_use]
pub fn client_addr(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|hop| hop.trim().parse().ok())
        .unwrap_or_else(|| peer.ip())
}

/// Renders fan-out outputs as tab-separated `item type raw error` rows.
#[must_use]
pub fn render_tsv(outputs: &[DataOutput]) -> String {
    let mut text = String::from("item\ttype\traw\terror\n");
    for output in outputs {
        let _ = writeln!(
            text,
            "{}\t{}\t{}\t{}",
            tsv_field(&output.item),
            output.result.item_type(),
            tsv_field(output.result.raw()),
            tsv_field(&output.error)
        );
    }
    text
}

/// Replaces field and row separators inside a cell.
fn tsv_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

/// Merges a JSON object body over the query parameters.
fn merge_body(mut params: BTreeMap<String, String>, body: &Bytes) -> Result<BTreeMap<String, String>, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(params);
    }
    let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) else {
        return Err(message_response(
            StatusCode::BAD_REQUEST,
            "request body must be a JSON object",
            "bad_request",
        ));
    };
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::String(text) => {
                params.insert(key, text);
            }
            other => {
                params.insert(key, other.to_string());
            }
        }
    }
    Ok(params)
}

/// Converts request parameters into query inputs.
fn to_inputs(params: BTreeMap<String, String>) -> DataInputs {
    params.into_iter().fold(DataInputs::new(), |inputs, (key, value)| inputs.with(key, value))
}

/// JSON error body.
#[derive(Serialize)]
struct ErrorBody<'a> {
    /// Error message.
    error: &'a str,
    /// Stable error kind label.
    kind: &'a str,
}

/// Renders a query error with its mapped status.
fn error_response(err: &NodsError) -> Response {
    let mut status = status_for(Some(err));
    if status == StatusCode::OK {
        status = StatusCode::UNPROCESSABLE_ENTITY;
    }
    message_response(status, &err.to_string(), err.kind().as_str())
}

/// Renders a JSON error body.
fn message_response(status: StatusCode, error: &str, kind: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error,
            kind,
        }),
    )
        .into_response()
}
