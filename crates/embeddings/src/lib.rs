//! # Mentor Embeddings
//!
//! Turns batches of text into fixed-length vectors for the embedding sidecar.
//!
//! ```text
//! {"texts": [...]}
//!     │
//!     ├──> Tokenizer (padding to batch longest, truncation at 512)
//!     │
//!     ├──> ONNX model ─> final hidden states [batch, tokens, hidden]
//!     │
//!     └──> mean over attended token positions ─> Vec<f32> per text
//! ```
//!
//! A deterministic stub backend stands in for the model in tests and offline
//! runs.

mod config;
mod error;
mod onnx;
mod service;
mod stub;

use std::sync::Arc;

pub use config::{EmbedConfig, EmbeddingMode};
pub use error::{EmbeddingError, Result};
pub use onnx::OnnxEmbedder;
pub use service::EmbeddingService;
pub use stub::StubEmbedder;

/// A backend producing one vector per input text, in input order.
pub trait Embedder: Send + Sync {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Load the backend selected by `config`.
pub fn load_embedder(config: &EmbedConfig) -> Result<Arc<dyn Embedder>> {
    match config.mode {
        EmbeddingMode::Onnx => Ok(Arc::new(OnnxEmbedder::load(&config.model_dir)?)),
        EmbeddingMode::Stub => Ok(Arc::new(StubEmbedder::new(config.stub_dimension)?)),
    }
}
