//! ChatServer listener
//!
//! Accepts TCP connections and spawns one session task per connection.
//! All sessions share the dispatcher, and through it the registry actor.

use std::net::SocketAddr;

use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{error, info};

use crate::dispatch::Dispatcher;
use crate::error::AppError;
use crate::session::handle_connection;

/// Bound chat server, ready to accept connections
pub struct ChatServer {
    listener: TcpListener,
    dispatcher: Dispatcher,
}

impl ChatServer {
    /// Bind the listening socket
    pub async fn bind(addr: impl ToSocketAddrs, dispatcher: Dispatcher) -> Result<Self, AppError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            dispatcher,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    /// Connection accept loop
    ///
    /// Runs until the task is dropped. Accept failures are logged and the
    /// loop keeps going.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("Connection is established with {}", addr);
                    let dispatcher = self.dispatcher.clone();

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        let peer = addr.to_string();
                        if let Err(e) = handle_connection(stream, peer, dispatcher).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
