use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnswerError>;

/// Failures surfaced to the caller while answering one prompt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnswerError {
    /// A matching rule needs a statistic the prompt never provided.
    #[error("field not available: {field}")]
    FieldUnavailable { field: &'static str },
}

impl AnswerError {
    pub const fn missing(field: &'static str) -> Self {
        Self::FieldUnavailable { field }
    }
}
