//! kvsock TCP server
//!
//! A single accept loop hands every connection to its own tokio task. The
//! loop never touches the store and never waits for a handler to finish.

use crate::{
    connection::{handle_connection, ConnectionOptions, Framing, Outcome},
    error::{KvError, Result},
    store::MemoryStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    net::{TcpListener, TcpSocket},
    sync::{broadcast, OwnedSemaphorePermit, Semaphore},
};
use tracing::{debug, error, info, warn};

/// Port the server listens on unless configured otherwise
pub const DEFAULT_PORT: u16 = 8888;

/// kvsock server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Pending-connection queue length passed to `listen`
    pub backlog: u32,
    /// Cap on connections being handled at once; `None` is unbounded
    pub max_connections: Option<usize>,
    pub read_timeout: Option<Duration>,
    pub framing: Framing,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            backlog: 128,
            max_connections: None,
            read_timeout: None,
            framing: Framing::SingleRead,
        }
    }
}

impl ServerConfig {
    fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            framing: self.framing,
            read_timeout: self.read_timeout,
        }
    }
}

/// kvsock TCP server
pub struct KvServer {
    config: ServerConfig,
    listener: TcpListener,
    store: Arc<MemoryStore>,
    limiter: Option<Arc<Semaphore>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl KvServer {
    /// Bind the listening socket
    ///
    /// Any failure here is fatal: the server never reaches its accept loop.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let addr = config.bind_addr;
        let listener = listen(addr, config.backlog).map_err(|source| KvError::Bind { addr, source })?;

        let limiter = config
            .max_connections
            .map(|limit| Arc::new(Semaphore::new(limit)));
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            listener,
            store: Arc::new(MemoryStore::new()),
            limiter,
            shutdown_tx,
        })
    }

    /// Address actually bound, which differs from the configured one for port 0
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared handle to the store served by this instance
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }

    /// Sender that stops the accept loop when signalled
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Accept connections until shutdown is signalled
    ///
    /// Handlers already spawned are left to finish their single exchange.
    pub async fn run(&self) -> Result<()> {
        info!("kvsock server listening on {}", self.local_addr()?);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let options = self.config.connection_options();

        loop {
            let permit = tokio::select! {
                permit = self.acquire_slot() => permit,
                _ = shutdown_rx.recv() => break,
            };

            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("New client connected: {}", addr);
                            let store = Arc::clone(&self.store);

                            tokio::spawn(async move {
                                let _permit = permit;
                                match handle_connection(stream, &*store, options).await {
                                    Ok(Outcome::Responded(response)) => {
                                        debug!(%addr, ?response, "request served");
                                    }
                                    Ok(Outcome::Closed) => debug!(%addr, "client closed without a request"),
                                    Ok(Outcome::TimedOut) => debug!(%addr, "client sent no request in time"),
                                    Err(e) => warn!("Error handling client {}: {}", addr, e),
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }

                _ = shutdown_rx.recv() => break,
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Wait for room under `max_connections`; unbounded servers never wait
    async fn acquire_slot(&self) -> Option<OwnedSemaphorePermit> {
        match &self.limiter {
            Some(limiter) => Arc::clone(limiter).acquire_owned().await.ok(),
            None => None,
        }
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .map_err(|_| KvError::Server("Failed to send shutdown signal".to_string()))?;
        Ok(())
    }
}

fn listen(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}
