//! Client library for connecting to a kvsock server
//!
//! Every request uses a fresh connection, mirroring the server's
//! one-request-per-connection protocol.

use crate::bounded::BoundedBytes;
use crate::error::{KvError, Result};
use crate::protocol::{Command, Response, MAX_REQUEST_LEN};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Client for a kvsock server
#[derive(Debug, Clone)]
pub struct Client {
    addr: String,
}

impl Client {
    /// Create a client for the server at `addr`; no connection is opened yet
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Check that the server accepts connections
    pub async fn ping(&self) -> Result<()> {
        TcpStream::connect(&self.addr).await?;
        Ok(())
    }

    /// Send one raw request and return the raw reply
    ///
    /// The write side is shut down after the request so servers that read
    /// until end of stream see a complete request. The reply is read until
    /// the server closes the connection.
    pub async fn request(&self, request: &[u8]) -> Result<Vec<u8>> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        stream.write_all(request).await?;
        stream.shutdown().await?;

        let mut reply = Vec::new();
        (&mut stream)
            .take(MAX_REQUEST_LEN as u64)
            .read_to_end(&mut reply)
            .await?;
        Ok(reply)
    }

    /// Send a command and interpret the reply
    async fn send_command(&self, command: &Command) -> Result<Response> {
        let reply = self.request(&command.to_bytes()).await?;
        if reply.is_empty() {
            return Err(KvError::Client(
                "server closed the connection without replying".to_string(),
            ));
        }
        Response::from_reply(command, &reply)
    }

    /// Set a key-value pair
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let command = Command::Set {
            key: token(key)?,
            value: token(value)?,
        };

        match self.send_command(&command).await? {
            Response::Ok => Ok(()),
            Response::Error => Err(KvError::Server("SET rejected".to_string())),
            other => Err(KvError::Protocol(format!(
                "Unexpected response for SET: {:?}",
                other
            ))),
        }
    }

    /// Get a value by key, byte for byte as the server stored it
    pub async fn get(&self, key: &str) -> Result<Option<BoundedBytes>> {
        let command = Command::Get { key: token(key)? };

        match self.send_command(&command).await? {
            Response::Value(value) => Ok(Some(value)),
            Response::NotFound => Ok(None),
            other => Err(KvError::Protocol(format!(
                "Unexpected response for GET: {:?}",
                other
            ))),
        }
    }

    /// Delete a key; succeeds whether or not the key existed
    pub async fn delete(&self, key: &str) -> Result<()> {
        let command = Command::Delete { key: token(key)? };

        match self.send_command(&command).await? {
            Response::Ok => Ok(()),
            Response::Error => Err(KvError::Server("DELETE rejected".to_string())),
            other => Err(KvError::Protocol(format!(
                "Unexpected response for DELETE: {:?}",
                other
            ))),
        }
    }
}

/// Validate a key or value before it goes on the wire
///
/// Whitespace would split the argument into several tokens and an empty
/// argument would vanish entirely.
fn token(arg: &str) -> Result<BoundedBytes> {
    if arg.is_empty() {
        return Err(KvError::InvalidArgument("empty argument".to_string()));
    }
    if arg.bytes().any(|c| c.is_ascii_whitespace() || c == 0x0b) {
        return Err(KvError::InvalidArgument(format!(
            "argument contains whitespace: {:?}",
            arg
        )));
    }
    Ok(BoundedBytes::from(arg))
}

/// Join command-line arguments into a request
///
/// Arguments are separated by single spaces and the result is cut at the
/// largest request the server reads.
pub fn build_request<S: AsRef<str>>(args: &[S]) -> Vec<u8> {
    let mut request = args
        .iter()
        .map(|arg| arg.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
        .into_bytes();
    request.truncate(MAX_REQUEST_LEN);
    request
}
