use crate::Embedder;
use anyhow::Context;
use async_trait::async_trait;
use mentor_protocol::LineService;
use mentor_protocol::{EmbedRequest, EmbedResponse};
use std::sync::Arc;

/// Line handler of the embedding sidecar. Inference is CPU bound and runs on
/// the blocking pool.
#[derive(Clone)]
pub struct EmbeddingService {
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingService {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl LineService for EmbeddingService {
    type Request = EmbedRequest;
    type Response = EmbedResponse;

    async fn call(&self, request: EmbedRequest) -> anyhow::Result<EmbedResponse> {
        if request.texts.is_empty() {
            return Ok(EmbedResponse {
                embeddings: Vec::new(),
            });
        }

        let count = request.texts.len();
        let embedder = Arc::clone(&self.embedder);
        let embeddings = tokio::task::spawn_blocking(move || embedder.embed_batch(&request.texts))
            .await
            .context("embedding task panicked")??;

        if embeddings.len() != count {
            anyhow::bail!(
                "embedder returned {} vectors for {count} texts",
                embeddings.len()
            );
        }
        log::debug!("Embedded {count} texts");
        Ok(EmbedResponse { embeddings })
    }
}
