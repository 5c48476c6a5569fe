//! Sink struct definition
//!
//! The outbound half of a session: a bounded queue drained by the
//! session's writer task.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::types::SessionId;

/// A place to write outbound lines to
///
/// Cloned into the registry and handed out by lookups and snapshots.
/// Once the owning session closes, the receiving end is dropped and every
/// delivery fails instead of touching the connection.
#[derive(Debug, Clone)]
pub struct Sink {
    /// Session that owns the receiving end
    session: SessionId,
    /// Session writer channel
    sender: mpsc::Sender<String>,
}

impl Sink {
    /// Create a sink for the given session and writer channel
    pub fn new(session: SessionId, sender: mpsc::Sender<String>) -> Self {
        Self { session, sender }
    }

    /// Session that owns the receiving end
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Queue a line for this session
    ///
    /// Returns an error if the channel is closed (session ended).
    pub async fn deliver(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.sender
            .send(line.into())
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Queue a line without waiting for room
    ///
    /// Used for fan-out, where one peer that stopped reading must not hold
    /// up the sender. A full queue drops the line.
    pub fn try_deliver(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.sender.try_send(line.into()).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Check whether the owning session has released its queue
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
