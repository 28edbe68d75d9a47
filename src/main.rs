//! kvsock server binary
//!
//! Main entry point for the kvsock TCP server

use clap::Parser;
use kvsock::{Framing, KvServer, ServerConfig, DEFAULT_PORT};
use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// In-memory key-value server, one command per connection
#[derive(Parser, Debug)]
#[command(name = "server", version, about)]
struct Args {
    /// Interface to listen on
    #[arg(short, long, default_value = "0.0.0.0")]
    listen: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Pending-connection queue length
    #[arg(long, default_value_t = 128)]
    backlog: u32,

    /// Cap on connections handled at once (unbounded when omitted)
    #[arg(long)]
    max_connections: Option<usize>,

    /// Give up on clients that send nothing for this long (waits forever when omitted)
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// How a request is delimited on the wire
    #[arg(long, value_enum, default_value_t = Framing::SingleRead)]
    framing: Framing,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::new(self.listen, self.port),
            backlog: self.backlog,
            max_connections: self.max_connections,
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
            framing: self.framing,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Usage errors exit with status 1; --help and --version exit cleanly
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    let config = args.into_config();

    let server = match KvServer::bind(config).await {
        Ok(server) => Arc::new(server),
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Setup graceful shutdown on SIGINT (Ctrl+C)
    let server_clone = Arc::clone(&server);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }

        info!("Received Ctrl+C, initiating graceful shutdown...");
        if let Err(e) = server_clone.shutdown() {
            error!("Failed to initiate shutdown: {}", e);
        }
    });

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
