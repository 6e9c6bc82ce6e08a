use crate::error::{EmbeddingError, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MODEL_DIR: &str = "models/embedding";
pub const DEFAULT_STUB_DIMENSION: usize = 384;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EmbeddingMode {
    Onnx,
    Stub,
}

impl EmbeddingMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Onnx => "onnx",
            Self::Stub => "stub",
        }
    }
}

impl FromStr for EmbeddingMode {
    type Err = EmbeddingError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "stub" => Ok(Self::Stub),
            other => Err(EmbeddingError::InvalidConfig(format!(
                "Unsupported MENTOR_EMBEDDING_MODE '{other}' (expected 'onnx' or 'stub')"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbedConfig {
    pub mode: EmbeddingMode,
    /// Directory holding `model.onnx` and `tokenizer.json`.
    pub model_dir: PathBuf,
    pub stub_dimension: usize,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::Onnx,
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            stub_dimension: DEFAULT_STUB_DIMENSION,
        }
    }
}

impl EmbedConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(mode) = lookup("MENTOR_EMBEDDING_MODE") {
            config.mode = mode.parse()?;
        }
        if let Some(dir) = lookup("MENTOR_MODEL_DIR").filter(|v| !v.trim().is_empty()) {
            config.model_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("MENTOR_EMBEDDING_DIM") {
            config.stub_dimension = raw.trim().parse().map_err(|_| {
                EmbeddingError::InvalidConfig(format!("Invalid MENTOR_EMBEDDING_DIM '{raw}'"))
            })?;
        }
        Ok(config)
    }
}
