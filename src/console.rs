//! Console relay
//!
//! Local keyboard input and display output. The operator console feeds
//! the same dispatch pipeline as remote sessions; the display task is the
//! single writer to the terminal.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::config::MAX_LINE_LENGTH;
use crate::dispatch::{Delivery, Dispatcher, Origin};
use crate::error::AppError;
use crate::protocol::{classify, is_exit};

/// Read the next console line
///
/// Returns `None` at end of input, on a read error, or when a line exceeds
/// `MAX_LINE_LENGTH` (the framed reader stops after a decode error).
pub(crate) async fn next_line<R>(lines: &mut FramedRead<R, LinesCodec>) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    match lines.next().await? {
        Ok(line) => Some(line),
        Err(LinesCodecError::MaxLineLengthExceeded) => {
            warn!("Console line longer than {} bytes, closing input", MAX_LINE_LENGTH);
            None
        }
        Err(LinesCodecError::Io(e)) => {
            warn!("Console read error: {}", e);
            None
        }
    }
}

/// Relay operator input into the dispatch pipeline
///
/// Returns when the operator types `exit` or the console closes; the
/// caller then shuts the server down.
pub async fn relay_operator<R>(input: R, dispatcher: Dispatcher) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(input, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    while let Some(line) = next_line(&mut lines).await {
        if is_exit(&line) {
            info!("Operator requested shutdown");
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        match dispatcher.dispatch(&Origin::Operator, classify(&line)).await? {
            Delivery::RecipientNotFound { recipient } => {
                dispatcher.show(format!("Recipient '{}' is not connected", recipient));
            }
            delivery => debug!("Operator line dispatched: {:?}", delivery),
        }
    }

    info!("Operator console closed");
    Ok(())
}

/// Write display lines to `output` until every sender is dropped
pub async fn display<W>(output: W, mut lines: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    let mut output = FramedWrite::new(output, LinesCodec::new());

    while let Some(line) = lines.recv().await {
        if let Err(e) = output.send(line).await {
            warn!("Console write failed: {}", e);
            break;
        }
    }
}
