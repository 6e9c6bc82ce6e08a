use anyhow::{Context as AnyhowContext, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";
pub const DEFAULT_CORPUS_DIR: &str = "chunks";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Process-wide settings of the tutoring sidecar, resolved once at startup.
#[derive(Debug, Clone)]
pub struct TutorConfig {
    /// Generation is disabled when no key is configured.
    pub api_key: Option<String>,
    pub api_url: String,
    pub corpus_dir: PathBuf,
    pub request_timeout: Duration,
    /// Number of corpus fragments sent with a generation request; `None` sends all.
    pub context_chunks: Option<usize>,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            corpus_dir: PathBuf::from(DEFAULT_CORPUS_DIR),
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            context_chunks: None,
        }
    }
}

impl TutorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |primary: &str, fallback: Option<&str>| {
            lookup(primary)
                .or_else(|| fallback.and_then(&lookup))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self {
            api_key: var("MENTOR_GEMINI_API_KEY", Some("GEMINI_API_KEY")),
            ..Self::default()
        };
        if let Some(url) = var("MENTOR_GEMINI_URL", None) {
            config.api_url = url;
        }
        if let Some(dir) = var("MENTOR_CORPUS_DIR", None) {
            config.corpus_dir = PathBuf::from(dir);
        }
        if let Some(raw) = var("MENTOR_GENERATION_TIMEOUT_MS", None) {
            let ms: u64 = raw
                .parse()
                .with_context(|| format!("Invalid MENTOR_GENERATION_TIMEOUT_MS '{raw}'"))?;
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = var("MENTOR_CONTEXT_CHUNKS", None) {
            let chunks: usize = raw
                .parse()
                .with_context(|| format!("Invalid MENTOR_CONTEXT_CHUNKS '{raw}'"))?;
            config.context_chunks = Some(chunks);
        }
        Ok(config)
    }

    pub const fn generation_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Startup checks; failures here abort the process before it serves.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            anyhow::bail!("generation timeout must be greater than zero");
        }
        if self.corpus_dir.exists() && !self.corpus_dir.is_dir() {
            anyhow::bail!(
                "corpus path {} is not a directory",
                self.corpus_dir.display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = TutorConfig::from_lookup(lookup(&[])).unwrap();
        assert!(!config.generation_enabled());
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.corpus_dir, PathBuf::from(DEFAULT_CORPUS_DIR));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.context_chunks, None);
    }

    #[test]
    fn legacy_api_key_is_used_as_fallback() {
        let config =
            TutorConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "legacy")])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("legacy"));

        let config = TutorConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "legacy"),
            ("MENTOR_GEMINI_API_KEY", "primary"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn blank_api_key_disables_generation() {
        let config =
            TutorConfig::from_lookup(lookup(&[("MENTOR_GEMINI_API_KEY", "  ")])).unwrap();
        assert!(!config.generation_enabled());
    }

    #[test]
    fn numeric_settings_are_parsed_and_validated() {
        let config = TutorConfig::from_lookup(lookup(&[
            ("MENTOR_GENERATION_TIMEOUT_MS", "250"),
            ("MENTOR_CONTEXT_CHUNKS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.context_chunks, Some(3));

        let err = TutorConfig::from_lookup(lookup(&[("MENTOR_CONTEXT_CHUNKS", "many")]))
            .expect_err("invalid chunk count");
        assert!(err.to_string().contains("MENTOR_CONTEXT_CHUNKS"));
    }

    #[test]
    fn corpus_path_must_be_a_directory_when_present() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = TutorConfig {
            corpus_dir: file.path().to_path_buf(),
            ..TutorConfig::default()
        };
        assert!(config.validate().is_err());

        let missing = TutorConfig {
            corpus_dir: PathBuf::from("/definitely/not/here"),
            ..TutorConfig::default()
        };
        assert!(missing.validate().is_ok());
    }
}
