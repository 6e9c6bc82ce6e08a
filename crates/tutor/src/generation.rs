use crate::config::TutorConfig;
use crate::context::ContextLoader;
use anyhow::{Context as AnyhowContext, Result};
use async_trait::async_trait;
use mentor_stats::UserStats;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Free-text answers from a hosted generative model.
///
/// Implementations never fail outward: any problem is logged and yields an
/// empty string.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, question: &str, stats: &UserStats) -> String;
}

/// Used when no API key is configured.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    async fn generate(&self, _question: &str, _stats: &UserStats) -> String {
        log::debug!("Generation disabled (no API key configured)");
        String::new()
    }
}

pub struct GeminiClient {
    http: Client,
    endpoint: String,
    api_key: String,
    context: Arc<ContextLoader>,
    context_chunks: Option<usize>,
}

impl GeminiClient {
    /// Reads the corpus immediately so no request handler touches the
    /// filesystem.
    pub fn new(config: &TutorConfig, api_key: String, context: Arc<ContextLoader>) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        context.load();
        Ok(Self {
            http,
            endpoint: config.api_url.clone(),
            api_key,
            context,
            context_chunks: config.context_chunks,
        })
    }

    async fn request(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        // Errors are stripped of the URL so the key in the query string is never logged.
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("generation request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("generation API returned {status}: {}", truncate(&text, 200));
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context("generation API returned an unexpected body")?;
        payload.first_text()
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, question: &str, stats: &UserStats) -> String {
        let fragments = self.context.select(question, self.context_chunks);
        let prompt = build_enhanced_prompt(&fragments.join("\n"), question, stats);
        match self.request(&prompt).await {
            Ok(text) => text,
            Err(err) => {
                log::warn!("Error generating response: {err:#}");
                String::new()
            }
        }
    }
}

/// Prompt sent to the generative API. Only the level and the average score
/// of the learner are included.
pub fn build_enhanced_prompt(context: &str, question: &str, stats: &UserStats) -> String {
    let level = stats.level.as_deref().unwrap_or("Unknown");
    let score = stats
        .average_score
        .map_or_else(|| "Unknown".to_string(), |score| score.to_string());
    format!(
        "
Context from mathematical knowledge base:
{context}

User Information:
Level: {level}
Score: {score}

User Question:
{question}

Please provide a response that:
1. Uses the mathematical context provided
2. Is appropriate for the user's level
3. Helps them progress in their learning journey
"
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate; no candidates means "".
    fn first_text(self) -> Result<String> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Ok(String::new());
        };
        let part = candidate
            .content
            .and_then(|content| content.parts.into_iter().next())
            .context("first candidate has no content parts")?;
        Ok(part.text)
    }
}
