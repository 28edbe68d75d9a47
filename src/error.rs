//! Error types for kvsock

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias for kvsock operations
pub type Result<T> = std::result::Result<T, KvError>;

/// Custom error types for kvsock
#[derive(Error, Debug)]
pub enum KvError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Protocol parse error: {0}")]
    Protocol(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for KvError {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        KvError::Protocol(format!("Parse error: {:?}", err))
    }
}
