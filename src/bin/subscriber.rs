//! Subscriber launcher
//!
//! Run with: subscriber <identity> <broker-ip> <broker-port>
//!
//! Stdin commands:
//!   subscribe <topic> <0|1>    0 = live only, 1 = store-and-forward
//!   unsubscribe <topic>
//!   exit
//!
//! Each matching publication is printed on its own stdout line.

use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, BufReader};

use feedbus_rs::client::{ClientEvent, SubscriberClient};

fn print_usage() {
    eprintln!("Usage: subscriber <identity> <broker-ip> <broker-port>");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <identity>     Durable client identity, at most 10 bytes");
    eprintln!("  <broker-ip>    Broker address");
    eprintln!("  <broker-port>  Broker TCP port");
}

enum Command {
    Continue,
    Quit,
}

async fn handle_command(client: &mut SubscriberClient, line: &str) -> Command {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("exit") => return Command::Quit,
        Some("subscribe") => {
            let (Some(topic), Some(sf)) = (words.next(), words.next()) else {
                eprintln!("Usage: subscribe <topic> <0|1>");
                return Command::Continue;
            };
            let sf = sf.parse::<u8>().map(|v| v >= 1).unwrap_or(false);
            if let Err(e) = client.subscribe(topic, sf).await {
                eprintln!("subscribe failed: {}", e);
            }
        }
        Some("unsubscribe") => {
            let Some(topic) = words.next() else {
                eprintln!("Usage: unsubscribe <topic>");
                return Command::Continue;
            };
            match client.unsubscribe(topic).await {
                Ok(true) => {}
                Ok(false) => eprintln!("not subscribed to '{}'", topic),
                Err(e) => eprintln!("unsubscribe failed: {}", e),
            }
        }
        Some(other) => eprintln!("unknown command '{}'", other),
        None => {}
    }
    Command::Continue
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }
    let (Some(identity), Some(ip), Some(port)) = (args.get(1), args.get(2), args.get(3))
    else {
        print_usage();
        return ExitCode::FAILURE;
    };

    let broker = match (ip.parse::<IpAddr>(), port.parse::<u16>()) {
        (Ok(ip), Ok(port)) => SocketAddr::new(ip, port),
        _ => {
            eprintln!("Error: invalid broker address {}:{}", ip, port);
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let mut client = match SubscriberClient::connect(identity.clone(), broker).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to connect: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if matches!(handle_command(&mut client, &line).await, Command::Quit) {
                        return ExitCode::SUCCESS;
                    }
                }
                Ok(None) | Err(_) => return ExitCode::SUCCESS,
            },
            event = client.next_event() => match event {
                ClientEvent::Publication { text } => println!("{}", text),
                ClientEvent::Subscribed { topic, .. } => println!("Subscribed to {}", topic),
                ClientEvent::Unsubscribed { topic } => println!("Unsubscribed from {}", topic),
                ClientEvent::Duplicate => {
                    eprintln!("Identity '{}' is already connected", client.identity());
                    return ExitCode::FAILURE;
                }
                ClientEvent::Closed => {
                    eprintln!("Broker closed the connection");
                    return ExitCode::FAILURE;
                }
            }
        }
    }
}
