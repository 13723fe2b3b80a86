//! Per-line stream watching.
//!
//! Reads a process output stream line by line and invokes a callback
//! for every line, in production order for that stream. Stops when the
//! stream ends, a deadline expires, or the caller cancels.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why a [`watch_lines`] call returned.
///
/// Callers that bound the watch must be able to tell a natural end of
/// stream from a deadline, even when the callback never fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEnd {
    /// The stream closed.
    Eof,
    /// The deadline expired before the stream closed.
    DeadlineExpired,
    /// The cancellation token fired.
    Cancelled,
}

/// Watch a stream and invoke `on_line` for every complete line.
///
/// Lines are delivered in the order the underlying process wrote them
/// to this stream. A read error ends the watch like an EOF (logged);
/// the lines observed up to that point have all been delivered.
pub async fn watch_lines<R>(
    stream: R,
    mut on_line: impl FnMut(&str),
    deadline: Option<Duration>,
    cancel: &CancellationToken,
) -> WatchEnd
where
    R: AsyncRead + Unpin,
{
    let reader = BufReader::new(stream);
    let mut lines = reader.lines();
    let expiry = deadline.map(|d| Instant::now() + d);
    let mut line_count = 0u64;

    loop {
        let next = async {
            match expiry {
                Some(at) => tokio::time::timeout_at(at, lines.next_line()).await,
                None => Ok(lines.next_line().await),
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(lines = line_count, "Line watch cancelled");
                return WatchEnd::Cancelled;
            }
            result = next => match result {
                Err(_) => {
                    debug!(lines = line_count, "Line watch deadline expired");
                    return WatchEnd::DeadlineExpired;
                }
                Ok(Ok(Some(line))) => {
                    line_count += 1;
                    on_line(&line);
                }
                Ok(Ok(None)) => {
                    debug!(lines = line_count, "Line watch reached end of stream");
                    return WatchEnd::Eof;
                }
                Ok(Err(e)) => {
                    warn!(lines = line_count, error = %e, "Stream read error, ending line watch");
                    return WatchEnd::Eof;
                }
            }
        }
    }
}
