//! Connection handler
//!
//! Serves exactly one request per connection: read the request, apply it to
//! the store, write the reply, close. There is no keep-alive and no second
//! read on the same connection.

use crate::error::Result;
use crate::protocol::{parse_command, Command, Response, MAX_REQUEST_LEN};
use crate::store::Store;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// How the handler decides it has received the whole request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Framing {
    /// A single read; whatever it returns is the request
    #[default]
    SingleRead,
    /// Keep reading until a newline, end of stream, or the size limit
    Line,
}

/// Per-connection settings, shared by every handler a server spawns
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionOptions {
    pub framing: Framing,
    /// `None` waits for the request indefinitely
    pub read_timeout: Option<Duration>,
}

/// How a handled connection ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A reply was written
    Responded(Response),
    /// The peer closed before sending anything
    Closed,
    /// No request arrived within the read timeout
    TimedOut,
}

/// Handle a single client connection
///
/// The stream is consumed and dropped on return, which closes it whether or
/// not the reply was delivered.
pub async fn handle_connection<T, S>(
    mut stream: T,
    store: &S,
    options: ConnectionOptions,
) -> Result<Outcome>
where
    T: AsyncRead + AsyncWrite + Unpin,
    S: Store + ?Sized,
{
    let read = read_request(&mut stream, options.framing);
    let request = match options.read_timeout {
        Some(limit) => match tokio::time::timeout(limit, read).await {
            Ok(result) => result?,
            Err(_) => {
                debug!(timeout = ?limit, "request read timed out");
                return Ok(Outcome::TimedOut);
            }
        },
        None => read.await?,
    };

    if request.is_empty() {
        return Ok(Outcome::Closed);
    }
    trace!(request = %String::from_utf8_lossy(&request), "received request");

    let response = process_request(&request, store);

    stream.write_all(&response.to_bytes()).await?;
    // The reply is already written; a failed close does not undo it
    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "shutdown after reply failed");
    }
    Ok(Outcome::Responded(response))
}

async fn read_request<T>(stream: &mut T, framing: Framing) -> io::Result<Vec<u8>>
where
    T: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; MAX_REQUEST_LEN];
    let mut filled = 0;

    loop {
        let n = stream.read(&mut buf[filled..]).await?;
        filled += n;

        let complete = match framing {
            Framing::SingleRead => true,
            Framing::Line => {
                n == 0 || filled == MAX_REQUEST_LEN || buf[filled - n..filled].contains(&b'\n')
            }
        };
        if complete {
            break;
        }
    }

    buf.truncate(filled);
    Ok(buf)
}

/// Parse a raw request and apply it, mapping any parse failure to `ERROR`
pub fn process_request<S: Store + ?Sized>(request: &[u8], store: &S) -> Response {
    match parse_command(request) {
        Ok(command) => execute(command, store),
        Err(e) => {
            debug!(error = %e, "rejecting request");
            Response::Error
        }
    }
}

/// Apply a parsed command to the store
pub fn execute<S: Store + ?Sized>(command: Command, store: &S) -> Response {
    match command {
        Command::Set { key, value } => {
            store.set(key, value);
            Response::Ok
        }
        Command::Get { key } => match store.get(&key) {
            Some(value) => Response::Value(value),
            None => Response::NotFound,
        },
        Command::Delete { key } => {
            // Deleting an absent key is still a success
            store.delete(&key);
            Response::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounded::BoundedBytes;
    use crate::store::MemoryStore;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::io::{duplex, DuplexStream, ReadBuf};

    /// Stream whose close always fails, as when the peer resets first
    struct FailingClose(DuplexStream);

    impl AsyncRead for FailingClose {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.0).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for FailingClose {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.0).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.0).poll_flush(cx)
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::ErrorKind::ConnectionReset.into()))
        }
    }

    async fn round_trip(store: &MemoryStore, request: &[u8]) -> Vec<u8> {
        let (mut client, server) = duplex(4096);
        client.write_all(request).await.unwrap();

        handle_connection(server, store, ConnectionOptions::default())
            .await
            .unwrap();

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        reply
    }

    #[tokio::test]
    async fn test_command_processing() {
        let store = MemoryStore::new();

        assert_eq!(round_trip(&store, b"SET name Hong").await, b"OK");
        assert_eq!(round_trip(&store, b"GET name").await, b"Hong");
        assert_eq!(round_trip(&store, b"DELETE name").await, b"OK");
        assert_eq!(round_trip(&store, b"GET name").await, b"NOT_FOUND");
        assert_eq!(round_trip(&store, b"DELETE name").await, b"OK");
    }

    #[tokio::test]
    async fn test_malformed_requests_leave_store_untouched() {
        let store = MemoryStore::new();
        store.set(BoundedBytes::from("k"), BoundedBytes::from("v"));

        for request in ["SET k", "GET", "DELETE", "FOO k v", "delete k"] {
            assert_eq!(round_trip(&store, request.as_bytes()).await, b"ERROR");
        }

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(&BoundedBytes::from("k")),
            Some(BoundedBytes::from("v"))
        );
    }

    #[tokio::test]
    async fn test_peer_closing_early_gets_no_reply() {
        let store = MemoryStore::new();
        let (client, server) = duplex(64);
        drop(client);

        let outcome = handle_connection(server, &store, ConnectionOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Closed);
    }

    #[tokio::test]
    async fn test_read_timeout_abandons_connection() {
        let store = MemoryStore::new();
        let (mut client, server) = duplex(64);
        let options = ConnectionOptions {
            framing: Framing::SingleRead,
            read_timeout: Some(Duration::from_millis(50)),
        };

        let outcome = handle_connection(server, &store, options).await.unwrap();
        assert_eq!(outcome, Outcome::TimedOut);

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert!(reply.is_empty());
    }

    #[tokio::test]
    async fn test_line_framing_reassembles_fragments() {
        let store = Arc::new(MemoryStore::new());
        let (mut client, server) = duplex(64);
        let options = ConnectionOptions {
            framing: Framing::Line,
            read_timeout: None,
        };

        let handler_store = Arc::clone(&store);
        let handler = tokio::spawn(async move {
            handle_connection(server, &*handler_store, options).await
        });

        client.write_all(b"SET frag").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.write_all(b"mented value\n").await.unwrap();

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"OK");
        assert_eq!(
            handler.await.unwrap().unwrap(),
            Outcome::Responded(Response::Ok)
        );
        assert_eq!(
            store.get(&BoundedBytes::from("fragmented")),
            Some(BoundedBytes::from("value"))
        );
    }

    #[tokio::test]
    async fn test_line_framing_accepts_unterminated_request_at_eof() {
        let store = MemoryStore::new();
        let (mut client, server) = duplex(64);
        client.write_all(b"SET k v").await.unwrap();
        client.shutdown().await.unwrap();

        let options = ConnectionOptions {
            framing: Framing::Line,
            read_timeout: None,
        };
        let outcome = handle_connection(server, &store, options).await.unwrap();
        assert_eq!(outcome, Outcome::Responded(Response::Ok));
    }

    #[tokio::test]
    async fn test_failed_close_after_reply_still_counts_as_served() {
        let store = MemoryStore::new();
        let (mut client, server) = duplex(64);
        client.write_all(b"SET k v").await.unwrap();

        let outcome = handle_connection(FailingClose(server), &store, ConnectionOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Responded(Response::Ok));

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"OK");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_execute_get_returns_value() {
        let store = MemoryStore::new();
        let key = BoundedBytes::from("a");

        assert_eq!(
            execute(Command::Get { key: key.clone() }, &store),
            Response::NotFound
        );
        execute(
            Command::Set {
                key: key.clone(),
                value: BoundedBytes::from("1"),
            },
            &store,
        );
        assert_eq!(
            execute(Command::Get { key }, &store),
            Response::Value(BoundedBytes::from("1"))
        );
    }
}
