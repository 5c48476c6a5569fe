//! Line chat client - Entry Point
//!
//! Connects to `localhost:<port>` and chats over stdin/stdout.

use std::env;
use std::process;

use tracing::{error, info};

use line_chat::{client, logging, Config};

#[tokio::main]
async fn main() {
    logging::init("line_chat=warn");

    let config = match Config::from_args(env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Usage: chat_client [port]");
            process::exit(2);
        }
    };
    if config.port_defaulted {
        info!("Port isn't specified, default port {} will be used", config.port);
    }

    let addr = config.server_addr();
    println!("Connecting to {}", addr);

    let code = match client::connect_and_run(&addr, tokio::io::stdin(), tokio::io::stdout()).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Client error: {}", e);
            eprintln!("Could not talk to server at {}: {}", addr, e);
            1
        }
    };

    // Stdin reads cannot be cancelled; exit instead of waiting on the runtime
    process::exit(code);
}
