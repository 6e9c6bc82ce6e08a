//! # Mentor Tutor
//!
//! Answers a learner's question about their own statistics.
//!
//! ```text
//! {"prompt": ...}
//!     │
//!     ├──> Stats extraction (mentor-stats)
//!     │
//!     ├──> Ordered keyword rules ──> templated answer
//!     │
//!     └──> no rule matched ──> Generation client (context corpus + Gemini)
//!                                  └─> help message when it has nothing
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod generation;

mod error;
mod service;

use anyhow::Result;
use std::sync::Arc;

pub use config::TutorConfig;
pub use context::ContextLoader;
pub use dispatch::{Question, HELP_MESSAGE};
pub use error::{AnswerError, Result as AnswerResult};
pub use generation::{build_enhanced_prompt, DisabledGenerator, GeminiClient, Generator};
pub use service::TutorService;

/// Wire the service from a validated configuration.
pub fn build_service(config: &TutorConfig) -> Result<TutorService> {
    config.validate()?;
    let generator: Arc<dyn Generator> = match &config.api_key {
        Some(key) => {
            let context = Arc::new(ContextLoader::new(&config.corpus_dir));
            log::info!(
                "Generation enabled (corpus {}, timeout {:?})",
                context.dir().display(),
                config.request_timeout
            );
            Arc::new(GeminiClient::new(config, key.clone(), context)?)
        }
        None => {
            log::warn!("No Gemini API key configured; unmatched questions get the help message");
            Arc::new(DisabledGenerator)
        }
    };
    Ok(TutorService::new(generator))
}
