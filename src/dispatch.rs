//! Message dispatch
//!
//! The send pipeline shared by sessions and the operator console: takes a
//! classified route, resolves recipients through the registry and delivers
//! outside the registry actor.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{AppError, SendError};
use crate::protocol::{format_delivery, Route, SERVER_SENDER};
use crate::registry::Registry;
use crate::types::DisplayName;

/// Who a routed line comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// The server operator's console
    Operator,
    /// A negotiated client session
    Session(DisplayName),
}

impl Origin {
    /// Name written in front of delivered lines
    pub fn sender_name(&self) -> &str {
        match self {
            Origin::Operator => SERVER_SENDER,
            Origin::Session(name) => name.as_str(),
        }
    }

    fn is(&self, name: &DisplayName) -> bool {
        matches!(self, Origin::Session(own) if own == name)
    }
}

/// Result of dispatching one route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Fanned out; `delivered` sessions accepted the line
    Broadcast { delivered: usize },
    /// Queued for the recipient
    Directed { recipient: String },
    /// No live session holds the recipient name
    RecipientNotFound { recipient: String },
    /// The recipient's queue was full; the line was not queued
    Dropped { recipient: String },
}

/// Routes lines to registered sessions and mirrors them on the server console
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Registry,
    /// Server console display lines
    console: mpsc::UnboundedSender<String>,
}

impl Dispatcher {
    pub fn new(registry: Registry, console: mpsc::UnboundedSender<String>) -> Self {
        Self { registry, console }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Show a line on the server console
    ///
    /// Best effort: a stopped console does not affect delivery.
    pub fn show(&self, line: impl Into<String>) {
        let _ = self.console.send(line.into());
    }

    /// Deliver a classified line on behalf of `origin`
    ///
    /// Broadcasts go to every registered session except the origin's own.
    /// Delivery never waits on a recipient: a session whose queue is full
    /// or closed is skipped, so a peer that stopped reading cannot stall
    /// the sender.
    pub async fn dispatch(&self, origin: &Origin, route: Route) -> Result<Delivery, AppError> {
        let sender = origin.sender_name();

        match route {
            Route::Broadcast(body) => {
                let line = format_delivery(sender, &body);
                if matches!(origin, Origin::Session(_)) {
                    self.show(line.clone());
                }

                let targets = self.registry.snapshot().await?;
                let mut delivered = 0;
                for (name, sink) in targets.iter().filter(|(name, _)| !origin.is(name)) {
                    if sink.is_closed() {
                        debug!("Broadcast to '{}' skipped: session closing", name);
                        continue;
                    }
                    match sink.try_deliver(line.clone()) {
                        Ok(()) => delivered += 1,
                        Err(SendError::Full) => {
                            warn!("'{}' is not reading, broadcast line dropped", name)
                        }
                        Err(e) => debug!("Broadcast to '{}' skipped: {}", name, e),
                    }
                }

                debug!("Broadcast from '{}' reached {} session(s)", sender, delivered);
                Ok(Delivery::Broadcast { delivered })
            }
            Route::Directed { recipient, body } => {
                let Some(sink) = self.registry.lookup(&recipient).await? else {
                    return Ok(Delivery::RecipientNotFound { recipient });
                };

                match sink.try_deliver(format_delivery(sender, &body)) {
                    Ok(()) => {}
                    Err(SendError::Full) => {
                        warn!(
                            "'{}' is not reading, message from '{}' dropped",
                            recipient, sender
                        );
                        return Ok(Delivery::Dropped { recipient });
                    }
                    Err(SendError::ChannelClosed) => {
                        // Recipient closed between lookup and delivery
                        debug!("Directed message to '{}' dropped: session closed", recipient);
                        return Ok(Delivery::RecipientNotFound { recipient });
                    }
                }

                if matches!(origin, Origin::Session(_)) {
                    self.show(format!("[{} -> {}] {}", sender, recipient, body));
                }
                Ok(Delivery::Directed { recipient })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::classify;
    use crate::sink::Sink;
    use crate::types::SessionId;

    struct Harness {
        dispatcher: Dispatcher,
        console_rx: mpsc::UnboundedReceiver<String>,
    }

    fn harness() -> Harness {
        let (console_tx, console_rx) = mpsc::unbounded_channel();
        Harness {
            dispatcher: Dispatcher::new(Registry::spawn(), console_tx),
            console_rx,
        }
    }

    async fn join(dispatcher: &Dispatcher, raw: &str) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(8);
        dispatcher
            .registry()
            .register(DisplayName::parse(raw).unwrap(), Sink::new(SessionId::new(), tx))
            .await
            .unwrap();
        rx
    }

    fn session(raw: &str) -> Origin {
        Origin::Session(DisplayName::parse(raw).unwrap())
    }

    #[tokio::test]
    async fn test_broadcast_skips_origin() {
        let mut h = harness();
        let mut alice = join(&h.dispatcher, "alice").await;
        let mut bob = join(&h.dispatcher, "bob").await;
        let mut carol = join(&h.dispatcher, "carol").await;

        let delivery = h
            .dispatcher
            .dispatch(&session("alice"), classify("hello"))
            .await
            .unwrap();

        assert_eq!(delivery, Delivery::Broadcast { delivered: 2 });
        assert_eq!(bob.recv().await.as_deref(), Some("alice: hello"));
        assert_eq!(carol.recv().await.as_deref(), Some("alice: hello"));
        assert!(alice.try_recv().is_err());
        assert_eq!(h.console_rx.recv().await.as_deref(), Some("alice: hello"));
    }

    #[tokio::test]
    async fn test_broadcast_survives_closed_recipient() {
        let h = harness();
        let bob = join(&h.dispatcher, "bob").await;
        let mut carol = join(&h.dispatcher, "carol").await;
        drop(bob);

        let delivery = h
            .dispatcher
            .dispatch(&session("alice"), classify("still there?"))
            .await
            .unwrap();

        assert_eq!(delivery, Delivery::Broadcast { delivered: 1 });
        assert_eq!(carol.recv().await.as_deref(), Some("alice: still there?"));
    }

    #[tokio::test]
    async fn test_stalled_recipient_does_not_block_fan_out() {
        let h = harness();
        // Never drained: capacity 8, then full
        let _stalled = join(&h.dispatcher, "bob").await;
        let mut carol = join(&h.dispatcher, "carol").await;

        for i in 0..20 {
            let delivery = tokio::time::timeout(
                std::time::Duration::from_secs(1),
                h.dispatcher.dispatch(&session("alice"), classify(&format!("line {}", i))),
            )
            .await
            .expect("dispatch waited on a full queue")
            .unwrap();

            let expected = if i < 8 { 2 } else { 1 };
            assert_eq!(delivery, Delivery::Broadcast { delivered: expected });
            assert_eq!(carol.recv().await, Some(format!("alice: line {}", i)));
        }

        let delivery = h
            .dispatcher
            .dispatch(&session("alice"), classify("bob <- hello?"))
            .await
            .unwrap();
        assert_eq!(
            delivery,
            Delivery::Dropped {
                recipient: "bob".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_directed_reaches_only_recipient() {
        let h = harness();
        let mut alice = join(&h.dispatcher, "alice").await;
        let mut bob = join(&h.dispatcher, "bob").await;
        let mut carol = join(&h.dispatcher, "carol").await;

        let delivery = h
            .dispatcher
            .dispatch(&session("alice"), classify("bob <- hi"))
            .await
            .unwrap();

        assert_eq!(
            delivery,
            Delivery::Directed {
                recipient: "bob".to_string()
            }
        );
        assert_eq!(bob.recv().await.as_deref(), Some("alice: hi"));
        assert!(alice.try_recv().is_err());
        assert!(carol.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_directed_recipient_not_found() {
        let h = harness();
        let mut bob = join(&h.dispatcher, "bob").await;

        let delivery = h
            .dispatcher
            .dispatch(&session("alice"), classify("charlie <- hi"))
            .await
            .unwrap();

        assert_eq!(
            delivery,
            Delivery::RecipientNotFound {
                recipient: "charlie".to_string()
            }
        );
        assert!(bob.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_operator_lines_use_server_sender() {
        let mut h = harness();
        let mut alice = join(&h.dispatcher, "alice").await;
        let mut bob = join(&h.dispatcher, "bob").await;

        h.dispatcher
            .dispatch(&Origin::Operator, classify("maintenance soon"))
            .await
            .unwrap();
        h.dispatcher
            .dispatch(&Origin::Operator, classify("bob <- you first"))
            .await
            .unwrap();

        assert_eq!(alice.recv().await.as_deref(), Some("Server: maintenance soon"));
        assert_eq!(bob.recv().await.as_deref(), Some("Server: maintenance soon"));
        assert_eq!(bob.recv().await.as_deref(), Some("Server: you first"));
        assert!(alice.try_recv().is_err());
        // The operator's own lines are not echoed back to the console
        assert!(h.console_rx.try_recv().is_err());
    }
}
