//! Line framing and pipe readers for Claude Code output.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Turn one raw line into text.
///
/// Strips the `\n` / `\r\n` terminator and decodes lossily. Returns `None`
/// for whitespace-only lines.
#[must_use]
pub fn frame_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = String::from_utf8_lossy(raw);
    if line.trim().is_empty() {
        None
    } else {
        Some(line.into_owned())
    }
}

/// Stateless helpers for reading Claude Code's pipes.
pub struct StreamParser;

impl StreamParser {
    /// Spawn a task that frames `reader` into lines and queues them.
    ///
    /// The channel closes when the reader reaches EOF, fails, or the
    /// receiver is dropped.
    pub fn into_lines<R>(reader: R) -> UnboundedReceiver<String>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = unbounded_channel();
        tokio::spawn(pump_lines(reader, tx));
        rx
    }

    /// Spawn a task that forwards `reader` as text in arrival order.
    ///
    /// Text is forwarded verbatim, one line at a time, terminators included.
    pub fn into_text<R>(reader: R) -> UnboundedReceiver<String>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = unbounded_channel();
        tokio::spawn(pump_text(reader, tx));
        rx
    }
}

async fn pump_lines<R>(reader: R, tx: UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut raw = Vec::new();

    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {
                let Some(line) = frame_line(&raw) else {
                    continue;
                };
                if tx.send(line).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stdout");
                break;
            }
        }
    }
}

async fn pump_text<R>(reader: R, tx: UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut raw = Vec::new();

    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(String::from_utf8_lossy(&raw).into_owned()).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stderr");
                break;
            }
        }
    }
}
