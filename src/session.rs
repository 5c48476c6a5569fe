//! Connection session handler
//!
//! Drives one accepted connection through `Negotiating -> Active -> Closed`.
//! A writer task owns the write half and drains the session's sink; the
//! session task owns the read half and runs the state machine.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::config::{MAX_LINE_LENGTH, SINK_BUFFER_SIZE};
use crate::dispatch::{Delivery, Dispatcher, Origin};
use crate::error::AppError;
use crate::protocol::{ack_line, classify, is_exit, not_found_notice, strip_sender, Ack};
use crate::registry::Registration;
use crate::sink::Sink;
use crate::types::{DisplayName, SessionId};

/// Session lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for an acceptable, unclaimed name
    Negotiating,
    /// Registered under the name, relaying lines
    Active(DisplayName),
    /// Terminal
    Closed,
}

type LineStream<S> = SplitStream<Framed<S, LinesCodec>>;
type LineSink<S> = SplitSink<Framed<S, LinesCodec>, String>;

/// Handle one connection until it closes
///
/// Transport errors and stream end close the session normally and are not
/// returned. Only a stopped registry is reported as an error.
pub async fn handle_connection<S>(
    stream: S,
    peer: String,
    dispatcher: Dispatcher,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let id = SessionId::new();
    info!("Session {} started for {}", id, peer);

    let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let (line_sink, lines) = framed.split();

    // Session -> connection queue; the registry holds clones of `sink`
    let (line_tx, line_rx) = mpsc::channel::<String>(SINK_BUFFER_SIZE);
    let writer = tokio::spawn(write_lines(id, line_sink, line_rx));

    let mut session = Session {
        id,
        peer,
        lines,
        sink: Sink::new(id, line_tx),
        writer,
        writer_done: false,
        dispatcher,
        name: None,
    };

    let result = session.drive().await;
    session.close().await;
    result
}

struct Session<S> {
    id: SessionId,
    peer: String,
    lines: LineStream<S>,
    sink: Sink,
    writer: JoinHandle<()>,
    writer_done: bool,
    dispatcher: Dispatcher,
    /// Set once registered, so close knows what to remove
    name: Option<DisplayName>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn drive(&mut self) -> Result<(), AppError> {
        let mut state = SessionState::Negotiating;

        loop {
            state = match state {
                SessionState::Negotiating => self.negotiate().await?,
                SessionState::Active(name) => self.relay(name).await?,
                SessionState::Closed => return Ok(()),
            };
        }
    }

    /// Claim a name; loops on rejection
    async fn negotiate(&mut self) -> Result<SessionState, AppError> {
        loop {
            let Some(line) = self.next_line().await else {
                return Ok(SessionState::Closed);
            };
            if is_exit(&line) {
                debug!("Session {} left during negotiation", self.id);
                return Ok(SessionState::Closed);
            }

            let name = match DisplayName::parse(&line) {
                Ok(name) => name,
                Err(e) => {
                    info!("Session {} offered invalid name: {}", self.id, e);
                    if !self.reply(Ack::Invalid).await {
                        return Ok(SessionState::Closed);
                    }
                    continue;
                }
            };

            let registry = self.dispatcher.registry();
            match registry.register(name.clone(), self.sink.clone()).await? {
                Registration::Registered => {
                    self.name = Some(name.clone());
                    if !self.reply(Ack::Accepted).await {
                        return Ok(SessionState::Closed);
                    }

                    let total = registry.len().await?;
                    info!("'{}' joined from {}", name, self.peer);
                    self.dispatcher.show(format!(
                        "{} joined the server. Total connections: {}",
                        name, total
                    ));
                    return Ok(SessionState::Active(name));
                }
                Registration::NameTaken => {
                    info!("Connection with '{}' exists, rejecting {}", name, self.peer);
                    if !self.reply(Ack::Taken).await {
                        return Ok(SessionState::Closed);
                    }
                }
            }
        }
    }

    /// Read loop: classify each line and dispatch it
    async fn relay(&mut self, name: DisplayName) -> Result<SessionState, AppError> {
        let origin = Origin::Session(name.clone());

        while let Some(line) = self.next_line().await {
            if is_exit(&line) {
                debug!("'{}' sent exit", name);
                break;
            }

            let body = strip_sender(&line, name.as_str());
            if body.trim().is_empty() {
                continue;
            }

            if let Delivery::RecipientNotFound { recipient } =
                self.dispatcher.dispatch(&origin, classify(body)).await?
            {
                warn!("'{}' addressed unknown recipient '{}'", name, recipient);
                // Never wait on our own queue; the peer may have stopped reading
                if let Err(e) = self.sink.try_deliver(not_found_notice(&recipient)) {
                    debug!("Notice for '{}' dropped: {}", name, e);
                }
            }
        }

        Ok(SessionState::Closed)
    }

    /// Next inbound line, or `None` once the session must close
    ///
    /// Stream end, read errors, over-long lines and a dead writer all
    /// end the session.
    async fn next_line(&mut self) -> Option<String> {
        tokio::select! {
            _ = &mut self.writer, if !self.writer_done => {
                self.writer_done = true;
                debug!("Writer ended for session {}", self.id);
                None
            }
            frame = self.lines.next() => match frame {
                Some(Ok(line)) => Some(line),
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!("Session {} sent a line over {} bytes", self.id, MAX_LINE_LENGTH);
                    None
                }
                Some(Err(LinesCodecError::Io(e))) => {
                    debug!("Read error for session {}: {}", self.id, e);
                    None
                }
                None => {
                    debug!("Connection closed for {}", self.peer);
                    None
                }
            }
        }
    }

    /// Send a negotiation reply; false if the connection is gone
    async fn reply(&self, ack: Ack) -> bool {
        self.sink.deliver(ack_line(ack)).await.is_ok()
    }

    /// Closed: deregister, stop the writer and drop the connection
    async fn close(self) {
        if let Some(name) = &self.name {
            let registry = self.dispatcher.registry();
            if registry.remove(name).await.unwrap_or(false) {
                let total = registry.len().await.unwrap_or(0);
                self.dispatcher.show(format!(
                    "{} left the server. Total connections: {}",
                    name, total
                ));
            }
        }

        // Dropping the queue receiver releases senders blocked on this session
        self.writer.abort();
        info!("Session {} closed for {}", self.id, self.peer);
    }
}

/// Writer task: sink queue -> connection
async fn write_lines<S>(
    id: SessionId,
    mut line_sink: LineSink<S>,
    mut line_rx: mpsc::Receiver<String>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(line) = line_rx.recv().await {
        if let Err(e) = line_sink.send(line).await {
            debug!("Write failed for session {}: {}", id, e);
            break;
        }
    }

    let _ = line_sink.close().await;
    debug!("Write task ended for session {}", id);
}
