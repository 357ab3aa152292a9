//! Broker launcher
//!
//! Run with: broker <port>
//!
//! Binds the TCP listener and the UDP datagram socket on the given port and
//! serves until the operator types `exit` on standard input (or Ctrl-C).

use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, BufReader};

use feedbus_rs::{BrokerConfig, BrokerServer};

fn print_usage() {
    eprintln!("Usage: broker <port>");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <port>    Port shared by the TCP and UDP listeners");
    eprintln!();
    eprintln!("Operator commands on stdin:");
    eprintln!("  exit      Flush journals, close subscribers and stop");
}

/// Resolve when the operator types `exit`
///
/// A closed stdin never resolves; the broker keeps serving (Ctrl-C still
/// stops it).
async fn operator_exit() {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim() == "exit" => return,
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => std::future::pending::<()>().await,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let port: u16 = match args.get(1).map(|p| p.parse()) {
        Some(Ok(port)) => port,
        Some(Err(_)) => {
            eprintln!("Error: invalid port: '{}'", args[1]);
            print_usage();
            return ExitCode::FAILURE;
        }
        None => {
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let server = match BrokerServer::bind(BrokerConfig::with_port(port)).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Failed to start broker: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = async {
        tokio::select! {
            _ = operator_exit() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    };

    match server.run_until(shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Broker error: {}", e);
            ExitCode::FAILURE
        }
    }
}
