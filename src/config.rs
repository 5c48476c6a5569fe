//! Startup configuration
//!
//! Both binaries take a single optional positional argument: the TCP port.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::ConfigError;

/// Port used when none is given on the command line
pub const DEFAULT_PORT: u16 = 8080;

/// Longest accepted line, in bytes, on sockets and consoles
pub const MAX_LINE_LENGTH: usize = 4096;

/// Per-session outbound queue capacity
pub const SINK_BUFFER_SIZE: usize = 32;

/// Registry actor command queue capacity
pub const REGISTRY_BUFFER_SIZE: usize = 256;

/// Client outbound queue capacity
pub const OUTBOUND_BUFFER_SIZE: usize = 32;

/// How long the client waits for queued lines to reach the server on exit
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Parsed command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// True when no port was given and `DEFAULT_PORT` is used
    pub port_defaulted: bool,
}

impl Config {
    /// Parse the arguments following the program name
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);

        let Some(raw) = args.next() else {
            return Ok(Self {
                port: DEFAULT_PORT,
                port_defaulted: true,
            });
        };

        if args.next().is_some() {
            return Err(ConfigError::TooManyArguments);
        }

        let port = raw
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(raw.clone()))?;

        Ok(Self {
            port,
            port_defaulted: false,
        })
    }

    /// Address the server listens on (all interfaces)
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// Address the client connects to
    pub fn server_addr(&self) -> String {
        format!("localhost:{}", self.port)
    }
}
