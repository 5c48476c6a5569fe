//! Line chat server - Entry Point
//!
//! Starts the registry actor, the TCP listener and the operator console.
//! The process ends when the operator types `exit`.

use std::env;
use std::process;

use tokio::sync::mpsc;
use tracing::{error, info};

use line_chat::{console, logging, ChatServer, Config, Dispatcher, Registry};

#[tokio::main]
async fn main() {
    logging::init("line_chat=info");

    let config = match Config::from_args(env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Usage: chat_server [port]");
            process::exit(2);
        }
    };
    if config.port_defaulted {
        info!("Port isn't specified, default port {} will be used", config.port);
    }

    // Console display task: the single writer to stdout
    let (console_tx, console_rx) = mpsc::unbounded_channel();
    tokio::spawn(console::display(tokio::io::stdout(), console_rx));

    let dispatcher = Dispatcher::new(Registry::spawn(), console_tx);

    let server = match ChatServer::bind(config.listen_addr(), dispatcher.clone()).await {
        Ok(server) => server,
        Err(e) => {
            error!("Error occurred during listening to port {}: {}", config.port, e);
            process::exit(1);
        }
    };
    info!("Chat server listening on {}", config.listen_addr());

    tokio::select! {
        _ = server.run() => {}
        result = console::relay_operator(tokio::io::stdin(), dispatcher) => {
            if let Err(e) = result {
                error!("Operator console error: {}", e);
            }
        }
    }

    info!("Server shutting down");
    // Stdin reads cannot be cancelled; exit instead of waiting on the runtime
    process::exit(0);
}
