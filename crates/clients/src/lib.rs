//! HTTP clients for the bank statement API and the destination database API.
//!
//! Both implement the engine's collaborator traits and report failures as
//! [`ApiError`]; the engine decides what a failure means for the run.

use engine::ApiError;
use thiserror::Error;

pub use inter::{InterClient, InterClientBuilder};
pub use notion::{NotionClient, NotionClientBuilder};

pub mod inter;
pub mod notion;

/// Errors raised while building a client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid client configuration: {0}")]
    Config(String),
}

fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn network(err: reqwest::Error) -> ApiError {
    ApiError::Network(err.to_string())
}

fn decode(err: reqwest::Error) -> ApiError {
    ApiError::Decode(err.to_string())
}

/// Turn a non-success response into an [`ApiError`], keeping the body as
/// message when it is readable.
async fn status_error(resp: reqwest::Response) -> ApiError {
    let status = resp.status();
    let message = match resp.text().await {
        Ok(body) if !body.trim().is_empty() => extract_message(&body),
        _ => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

fn extract_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    ["message", "detail", "error_description", "title", "error"]
        .into_iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}
