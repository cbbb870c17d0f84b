//! Error types for the chat relay
//!
//! Defines connection-level errors and the recoverable errors that are
//! reported back to users as `system` messages.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::Handle;

/// Connection-level errors
///
/// Always fatal to the connection that produced them, never to the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading or writing a protocol line failed (fatal)
    #[error("Line error: {0}")]
    Line(#[from] LineError),

    /// The peer closed the connection before finishing registration
    #[error("Connection closed during registration")]
    ClosedDuringRegistration,
}

/// Line reader errors
#[derive(Debug, Error)]
pub enum LineError {
    /// Underlying stream failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A single line exceeded the allowed length
    #[error("Line longer than {limit} bytes")]
    TooLong { limit: usize },
}

/// Handle validation errors
#[derive(Debug, Error)]
pub enum HandleError {
    /// Empty handle
    #[error("Username cannot be empty")]
    Empty,

    /// `system` or `all`
    #[error("Username '{0}' is reserved")]
    Reserved(String),
}

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Another session already holds this handle
    #[error("Username '{0}' is already taken")]
    AlreadyExists(Handle),
}

/// Dispatch errors
///
/// The sender has already been notified when one of these is returned.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Unicast target is not registered
    #[error("No such user: {0}")]
    NoSuchUser(String),
}
