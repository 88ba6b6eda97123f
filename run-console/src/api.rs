use gloo_net::http::Request;
use shared_types::{AgentOutput, FileDiff, Run, Session, Turn};
use std::sync::OnceLock;

/// Get the API base URL based on current environment
/// - In development (localhost): use http://localhost:8000
/// - In production: use same origin (API serves static files)
fn get_api_base() -> String {
    let hostname = web_sys::window()
        .and_then(|w| w.location().hostname().ok())
        .unwrap_or_default();

    if hostname == "localhost" || hostname == "127.0.0.1" {
        "http://localhost:8000".to_string()
    } else {
        "".to_string()
    }
}

/// Lazy-static equivalent for WASM - computed at first use
static API_BASE_CACHE: OnceLock<String> = OnceLock::new();

/// Get the cached API base URL
pub fn api_base() -> &'static str {
    API_BASE_CACHE.get_or_init(get_api_base).as_str()
}

async fn describe_http_error(response: gloo_net::http::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if body.trim().is_empty() {
        return format!("HTTP error: {status}");
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(&body) {
        if let Some(detail) = json.get("detail").and_then(|v| v.as_str()) {
            return format!("HTTP error: {status} ({detail})");
        }
        if let Some(message) = json.get("message").and_then(|v| v.as_str()) {
            return format!("HTTP error: {status} ({message})");
        }
    }

    format!("HTTP error: {status} ({body})")
}

async fn get_json<T: serde::de::DeserializeOwned>(url: &str) -> Result<T, String> {
    let response = Request::get(url)
        .send()
        .await
        .map_err(|e| format!("Request failed: {e}"))?;

    if !response.ok() {
        return Err(describe_http_error(response).await);
    }

    response
        .json::<T>()
        .await
        .map_err(|e| format!("Failed to parse JSON: {e}"))
}

pub async fn fetch_session(session_id: &str) -> Result<Session, String> {
    let url = format!("{}/api/v1/sessions/{}", api_base(), session_id);
    get_json(&url).await
}

pub async fn fetch_turn(session_id: &str, turn_id: &str) -> Result<Turn, String> {
    let url = format!(
        "{}/api/v1/sessions/{}/turns/{}",
        api_base(),
        session_id,
        turn_id
    );
    get_json(&url).await
}

pub async fn fetch_run(run_id: &str) -> Result<Run, String> {
    let url = format!("{}/api/v1/runs/{}", api_base(), run_id);
    get_json(&url).await
}

/// Fetch persisted outputs for a run, filtered to one output type.
pub async fn fetch_run_outputs(run_id: &str, output_type: &str) -> Result<Vec<AgentOutput>, String> {
    let url = format!(
        "{}/api/v1/runs/{}/outputs?output_type={}",
        api_base(),
        run_id,
        output_type
    );
    get_json(&url).await
}

/// Fetch the file diffs one variation produced. Returns an empty list when
/// the variation finished without touching any files.
pub async fn fetch_run_diffs(run_id: &str, variation_id: u32) -> Result<Vec<FileDiff>, String> {
    let url = format!(
        "{}/api/v1/runs/{}/diffs?variation_id={}",
        api_base(),
        run_id,
        variation_id
    );
    get_json(&url).await
}
