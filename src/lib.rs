//! Line-oriented TCP chat
//!
//! A chat server and client speaking a newline-terminated text protocol
//! over TCP, built on tokio.
//!
//! # Features
//! - Unique display name negotiation with retry
//! - Broadcast messages to every connected user
//! - Private messages with `recipient <- body`
//! - Server operator console that can broadcast or message anyone
//! - `exit` sentinel to leave from either side
//!
//! # Architecture
//! - `Registry` is an actor owning the name -> sink map; every operation is
//!   a message, so registration is atomic without locks
//! - Each connection runs a `session` task (reader and state machine) and a
//!   writer task draining its `Sink`
//! - `Dispatcher` resolves recipients through the registry and delivers
//!   outside the actor, so a slow peer never blocks registry operations
//!
//! # Example
//! ```ignore
//! use tokio::sync::mpsc;
//! use line_chat::{console, ChatServer, Dispatcher, Registry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (console_tx, console_rx) = mpsc::unbounded_channel();
//!     tokio::spawn(console::display(tokio::io::stdout(), console_rx));
//!
//!     let dispatcher = Dispatcher::new(Registry::spawn(), console_tx);
//!     let server = ChatServer::bind("0.0.0.0:8080", dispatcher).await.unwrap();
//!     server.run().await;
//! }
//! ```

pub mod client;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod sink;
pub mod types;

// Re-export main types for convenience
pub use config::Config;
pub use dispatch::{Delivery, Dispatcher, Origin};
pub use error::{AppError, ConfigError, NameError, SendError};
pub use protocol::{classify, Ack, Inbound, Route};
pub use registry::{Registration, Registry, RegistryCommand};
pub use server::ChatServer;
pub use session::{handle_connection, SessionState};
pub use sink::Sink;
pub use types::{DisplayName, SessionId};
