use crate::dispatch::{self, Question, HELP_MESSAGE};
use crate::error::Result;
use crate::generation::Generator;
use async_trait::async_trait;
use mentor_protocol::{LineService, TutorRequest, TutorResponse};
use std::sync::Arc;

/// Answers tutoring prompts: statistics extraction, rule dispatch, and the
/// generative fallback when no rule matches.
pub struct TutorService {
    generator: Arc<dyn Generator>,
}

impl TutorService {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    pub async fn respond(&self, prompt: &str) -> Result<String> {
        let stats = mentor_stats::extract(prompt);
        let question = Question::isolate(prompt);
        if let Some(reply) = dispatch::answer(&question, &stats)? {
            return Ok(reply);
        }

        let generated = self.generator.generate(question.text(), &stats).await;
        if generated.trim().is_empty() {
            Ok(HELP_MESSAGE.to_string())
        } else {
            Ok(generated)
        }
    }
}

#[async_trait]
impl LineService for TutorService {
    type Request = TutorRequest;
    type Response = TutorResponse;

    async fn call(&self, request: TutorRequest) -> anyhow::Result<TutorResponse> {
        let response = self.respond(&request.prompt).await?;
        Ok(TutorResponse { response })
    }
}
