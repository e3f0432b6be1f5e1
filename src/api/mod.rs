//! HTTP surface: JSON endpoints under `/api/` plus the static UI.
//!
//! Every API response is `200 OK` with a JSON body carrying `success`;
//! failures add an `error` string and nothing else.

mod static_files;

use crate::control::ControlApi;
use crate::error::Result;
use crate::sync::SyncOutcome;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    api: Arc<ControlApi>,
    web_root: Arc<PathBuf>,
}

/// Builds the router for `api`, serving static files from `web_root`.
pub fn router(api: Arc<ControlApi>, web_root: PathBuf) -> Router {
    let state = AppState {
        api,
        web_root: Arc::new(web_root),
    };

    Router::new()
        .route("/api/status", get(status).fallback(method_not_allowed))
        .route("/api/logs", get(logs).fallback(method_not_allowed))
        .route("/api/toggle", post(toggle).fallback(method_not_allowed))
        .route("/api/setSource", post(set_source).fallback(method_not_allowed))
        .route("/api/update", post(update).fallback(method_not_allowed))
        .route("/api/clearLog", post(clear_log).fallback(method_not_allowed))
        .route("/api/{*rest}", any(unknown_endpoint))
        .fallback(static_files::serve)
        .layer(axum::middleware::map_response(allow_any_origin))
        .with_state(state)
}

#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    #[serde(flatten)]
    payload: T,
}

#[derive(Serialize)]
struct Empty {}

#[derive(Serialize)]
struct LogsPayload {
    logs: Vec<crate::activity_log::LogEntry>,
}

#[derive(Serialize)]
struct UpdatePayload {
    timestamp: i64,
    domain_count: usize,
}

impl From<SyncOutcome> for UpdatePayload {
    fn from(o: SyncOutcome) -> Self {
        Self {
            timestamp: o.timestamp,
            domain_count: o.domain_count,
        }
    }
}

#[derive(Deserialize)]
struct ToggleRequest {
    #[serde(default = "default_enabled")]
    enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

#[derive(Deserialize)]
struct SetSourceRequest {
    #[serde(default)]
    url: String,
}

fn reply<T: Serialize>(result: Result<T>) -> Response {
    match result {
        Ok(payload) => Json(Envelope {
            success: true,
            payload,
        })
        .into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "Request failed");
            failure(e.user_message())
        }
    }
}

fn failure(message: &str) -> Response {
    Json(serde_json::json!({ "success": false, "error": message })).into_response()
}

/// Empty bodies count as `{}`.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Option<T> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).ok()
}

// Store calls are synchronous file I/O (`fsync` included); run them on the
// blocking pool rather than on an async worker.
async fn blocking<T, F>(state: &AppState, f: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&ControlApi) -> Result<T> + Send + 'static,
{
    let api = state.api.clone();
    match tokio::task::spawn_blocking(move || f(&api)).await {
        Ok(result) => reply(result),
        Err(e) => {
            tracing::error!(error = %e, "Store task aborted");
            failure("Internal error")
        }
    }
}

async fn status(State(state): State<AppState>) -> Response {
    blocking(&state, ControlApi::status).await
}

async fn logs(State(state): State<AppState>) -> Response {
    blocking(&state, |api| Ok(LogsPayload { logs: api.logs() })).await
}

async fn toggle(State(state): State<AppState>, body: Bytes) -> Response {
    let Some(req) = parse_body::<ToggleRequest>(&body) else {
        return failure("Invalid request");
    };
    blocking(&state, move |api| api.set_enabled(req.enabled).map(|()| Empty {})).await
}

async fn set_source(State(state): State<AppState>, body: Bytes) -> Response {
    let Some(req) = parse_body::<SetSourceRequest>(&body) else {
        return failure("Invalid request");
    };
    blocking(&state, move |api| api.set_source(&req.url).map(|()| Empty {})).await
}

async fn update(State(state): State<AppState>) -> Response {
    // Detached so a dropped connection cannot cancel a sync midway.
    let api = state.api.clone();
    match tokio::spawn(async move { api.trigger_update().await }).await {
        Ok(result) => reply(result.map(UpdatePayload::from)),
        Err(e) => {
            tracing::error!(error = %e, "Update task aborted");
            failure("Internal error")
        }
    }
}

async fn clear_log(State(state): State<AppState>) -> Response {
    blocking(&state, |api| api.clear_log().map(|()| Empty {})).await
}

async fn unknown_endpoint() -> Response {
    failure("Unknown endpoint")
}

async fn method_not_allowed() -> Response {
    let mut res = failure("Method not allowed");
    *res.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
    res
}

async fn allow_any_origin(mut res: Response) -> Response {
    res.headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_empty_object() {
        let req: ToggleRequest = parse_body(b"").unwrap();
        assert!(req.enabled);
        let req: SetSourceRequest = parse_body(b"  \n").unwrap();
        assert!(req.url.is_empty());
    }

    #[test]
    fn malformed_body_is_rejected() {
        assert!(parse_body::<ToggleRequest>(b"{enabled").is_none());
        assert!(parse_body::<ToggleRequest>(br#"{"enabled": "yes"}"#).is_none());
    }

    #[test]
    fn envelope_flattens_payload() {
        let value = serde_json::to_value(Envelope {
            success: true,
            payload: UpdatePayload {
                timestamp: 7,
                domain_count: 2,
            },
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"success": true, "timestamp": 7, "domain_count": 2})
        );

        let value = serde_json::to_value(Envelope {
            success: true,
            payload: Empty {},
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({"success": true}));
    }
}
