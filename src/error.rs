//! Error types for the chat service
//!
//! Defines application-level errors, sink send errors, startup configuration
//! errors and display name validation errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Application-level errors
///
/// Transport errors end the affected session only. A closed registry means
/// the registry actor has stopped and no session can make progress.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal for the connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error (fatal for the connection)
    #[error("Line transport error: {0}")]
    Lines(#[from] LinesCodecError),

    /// The registry actor is no longer running
    #[error("Registry closed")]
    RegistryClosed,

    /// Invalid command line arguments
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Message send errors
///
/// Occurs when a line cannot be queued for a session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The session's queue is full because its peer stopped reading
    #[error("Queue full")]
    Full,
}

/// Command line errors, reported before any socket is bound
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Too many command line arguments. Should specify only port.")]
    TooManyArguments,

    #[error("Port '{0}' entered as a command line argument is invalid. Couldn't convert it to a port number.")]
    InvalidPort(String),
}

/// Reasons a candidate display name is refused during negotiation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("Name is empty")]
    Empty,

    #[error("Name is longer than {max} characters")]
    TooLong { max: usize },

    #[error("Name contains forbidden sequence '{0}'")]
    ForbiddenCharacter(&'static str),

    #[error("Name '{0}' is reserved")]
    Reserved(String),
}
