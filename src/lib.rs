//! kvsock - an in-memory key-value store served over TCP
//!
//! Each connection carries exactly one text command (`SET`, `GET` or
//! `DELETE`) and receives exactly one reply. The library provides:
//! - A store guarded by a single exclusive lock
//! - A whitespace-token command codec
//! - A per-connection handler and a task-per-connection accept loop
//! - A client for scripting and tests

pub mod bounded;
pub mod client;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod server;
pub mod store;

pub use bounded::{BoundedBytes, MAX_FIELD_LEN};
pub use client::Client;
pub use connection::{ConnectionOptions, Framing};
pub use error::{KvError, Result};
pub use protocol::{Command, Response, MAX_REQUEST_LEN};
pub use server::{KvServer, ServerConfig, DEFAULT_PORT};
pub use store::{MemoryStore, Store};
