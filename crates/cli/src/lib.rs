use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, ValueEnum};
use mentor_embeddings::{EmbedConfig, EmbeddingMode, EmbeddingService};
use mentor_protocol::{serve_lines, LineLimits, LineService, EMBEDDING_READY_BANNER};
use mentor_tutor::TutorConfig;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};

#[derive(Args, Clone, Copy)]
struct LogArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Parser)]
#[command(name = "mentor-tutor")]
#[command(about = "Answers learner questions about their statistics, one JSON line at a time")]
#[command(version)]
struct TutorCli {
    #[command(flatten)]
    log: LogArgs,

    /// Directory of `*.txt` context fragments (overrides MENTOR_CORPUS_DIR)
    #[arg(long)]
    corpus_dir: Option<PathBuf>,

    /// Generation endpoint (overrides MENTOR_GEMINI_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Generation request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Number of context fragments sent with a generation request
    #[arg(long)]
    context_chunks: Option<usize>,
}

#[derive(Copy, Clone, ValueEnum)]
enum EmbedMode {
    Onnx,
    Stub,
}

impl EmbedMode {
    const fn as_domain(self) -> EmbeddingMode {
        match self {
            EmbedMode::Onnx => EmbeddingMode::Onnx,
            EmbedMode::Stub => EmbeddingMode::Stub,
        }
    }
}

#[derive(Parser)]
#[command(name = "mentor-embed")]
#[command(about = "Turns batches of text into embedding vectors, one JSON line at a time")]
#[command(version)]
struct EmbedCli {
    #[command(flatten)]
    log: LogArgs,

    /// Embedding backend (overrides MENTOR_EMBEDDING_MODE)
    #[arg(long, value_enum)]
    embed_mode: Option<EmbedMode>,

    /// Directory holding model.onnx and tokenizer.json (overrides MENTOR_MODEL_DIR)
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Vector length produced by the stub backend
    #[arg(long)]
    dim: Option<usize>,
}

fn init_logging(args: LogArgs) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // stdout carries the protocol; ort is only heard from in verbose mode
    if !args.verbose {
        builder.filter_module("ort", log::LevelFilter::Off);
    }
    builder.target(env_logger::Target::Stderr).init();
}

impl TutorCli {
    fn config(&self) -> Result<TutorConfig> {
        let mut config = TutorConfig::from_env()?;
        if let Some(dir) = &self.corpus_dir {
            config.corpus_dir = dir.clone();
        }
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
        if self.context_chunks.is_some() {
            config.context_chunks = self.context_chunks;
        }
        Ok(config)
    }
}

impl EmbedCli {
    fn config(&self) -> Result<EmbedConfig> {
        let mut config = EmbedConfig::from_env()?;
        if let Some(mode) = self.embed_mode {
            config.mode = mode.as_domain();
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(dim) = self.dim {
            config.stub_dimension = dim;
        }
        Ok(config)
    }
}

pub async fn tutor_entry() -> Result<()> {
    let cli = TutorCli::parse();
    init_logging(cli.log);

    let config = cli.config().context("Invalid tutor configuration")?;
    let service =
        mentor_tutor::build_service(&config).context("Failed to start tutoring service")?;
    log::info!("Tutoring service ready");

    serve_stdio(&service).await
}

pub async fn embed_entry() -> Result<()> {
    let cli = EmbedCli::parse();
    init_logging(cli.log);

    let config = cli.config().context("Invalid embedding configuration")?;
    log::info!("Loading {} embedding backend", config.mode.as_str());
    let embedder =
        mentor_embeddings::load_embedder(&config).context("Failed to load embedding backend")?;
    let service = EmbeddingService::new(embedder);

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(format!("{EMBEDDING_READY_BANNER}\n").as_bytes())
        .await?;
    stdout.flush().await?;

    serve_stdio(&service).await
}

async fn serve_stdio<S: LineService>(service: &S) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let summary = serve_lines(service, stdin, tokio::io::stdout(), LineLimits::default()).await?;
    log::info!(
        "Stdin closed; served {} requests ({} failed)",
        summary.handled,
        summary.failed
    );
    Ok(())
}
