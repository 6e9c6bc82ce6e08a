//! Wire types and the stdin/stdout line loop shared by the mentor sidecars.
//!
//! Every request is one JSON object on one line; every response is one JSON
//! object on one line, flushed immediately. A failing line produces an
//! `{"error": ...}` object and the loop keeps serving.

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod server;

pub use server::{serve_lines, LineLimits, LineService, ServeSummary, DEFAULT_MAX_LINE_BYTES};

/// Error text for lines that are not JSON at all.
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON input";

/// Readiness signal printed by the embedding sidecar before it reads stdin.
pub const EMBEDDING_READY_BANNER: &str = "Embedding service ready";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorLine {
    pub error: String,
}

impl ErrorLine {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct TutorRequest {
    /// Full prompt text; a request without it is treated as an empty prompt.
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TutorResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EmbedRequest {
    pub texts: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}
