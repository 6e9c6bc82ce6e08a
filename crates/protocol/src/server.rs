use crate::{serialize_json, ErrorLine, INVALID_JSON_MESSAGE};
use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// One request/response exchange of a sidecar.
#[async_trait]
pub trait LineService: Send + Sync {
    type Request: DeserializeOwned + Send;
    type Response: Serialize + Send;

    async fn call(&self, request: Self::Request) -> Result<Self::Response>;
}

#[derive(Debug, Clone, Copy)]
pub struct LineLimits {
    pub max_line_bytes: usize,
}

impl Default for LineLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeSummary {
    pub handled: usize,
    pub failed: usize,
}

enum RawLine {
    Line(Vec<u8>),
    Oversized,
    Eof,
}

/// Serve `service` until `reader` hits EOF.
///
/// Each input line yields exactly one output line. Only I/O failures on the
/// streams end the loop early.
pub async fn serve_lines<S, R, W>(
    service: &S,
    mut reader: R,
    mut writer: W,
    limits: LineLimits,
) -> Result<ServeSummary>
where
    S: LineService + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut summary = ServeSummary::default();
    loop {
        let outcome = match read_line_limited(&mut reader, limits.max_line_bytes).await? {
            RawLine::Eof => break,
            RawLine::Oversized => Err(format!(
                "Request exceeds {} bytes",
                limits.max_line_bytes
            )),
            RawLine::Line(bytes) => handle_line(service, &bytes).await,
        };
        summary.handled += 1;

        let payload = match outcome {
            Ok(json) => json,
            Err(message) => {
                summary.failed += 1;
                log::warn!("Request {} failed: {message}", summary.handled);
                serialize_json(&ErrorLine::new(message))?
            }
        };
        writer.write_all(payload.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    log::debug!(
        "Input closed after {} requests ({} failed)",
        summary.handled,
        summary.failed
    );
    Ok(summary)
}

async fn handle_line<S>(service: &S, bytes: &[u8]) -> std::result::Result<String, String>
where
    S: LineService + ?Sized,
{
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|_| INVALID_JSON_MESSAGE.to_string())?;
    let request: S::Request =
        serde_json::from_value(value).map_err(|err| format!("Invalid request: {err}"))?;
    let response = service.call(request).await.map_err(|err| format!("{err:#}"))?;
    serialize_json(&response).map_err(|err| err.to_string())
}

/// Reads one `\n`-terminated line. Bytes past `max_bytes` are drained and the
/// line is reported as oversized instead of buffered.
async fn read_line_limited<R>(reader: &mut R, max_bytes: usize) -> Result<RawLine>
where
    R: AsyncBufRead + Unpin,
{
    let mut out = Vec::new();
    let mut oversized = false;
    let mut saw_bytes = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if !saw_bytes {
                return Ok(RawLine::Eof);
            }
            break;
        }
        saw_bytes = true;

        let newline = available.iter().position(|b| *b == b'\n');
        let chunk_len = newline.unwrap_or(available.len());
        if !oversized {
            if out.len() + chunk_len > max_bytes {
                oversized = true;
                out = Vec::new();
            } else {
                out.extend_from_slice(&available[..chunk_len]);
            }
        }
        let consumed = newline.map_or(chunk_len, |pos| pos + 1);
        reader.consume(consumed);
        if newline.is_some() {
            break;
        }
    }

    if oversized {
        return Ok(RawLine::Oversized);
    }
    if out.last() == Some(&b'\r') {
        out.pop();
    }
    Ok(RawLine::Line(out))
}
