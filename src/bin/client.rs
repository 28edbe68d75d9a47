//! Command-line client for a kvsock server
//!
//! Sends its arguments as a single request and prints the raw reply:
//!
//! ```text
//! client SET name Hong
//! client GET name
//! client DELETE name
//! ```

use clap::Parser;
use kvsock::client::{build_request, Client};
use std::process::ExitCode;

/// Send one command to a kvsock server
#[derive(Parser, Debug)]
#[command(name = "client", version, about)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8888")]
    addr: String,

    /// Command and its arguments, e.g. `SET name Hong`
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
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
    let client = Client::new(args.addr);

    match client.request(&build_request(&args.command)).await {
        Ok(reply) => {
            println!("{}", String::from_utf8_lossy(&reply));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", client.addr(), e);
            ExitCode::FAILURE
        }
    }
}
