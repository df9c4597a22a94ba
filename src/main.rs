//! Starts a single zone node from command-line arguments.
//!
//! # Usage
//! ```text
//! zonechain <listen_addr> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `listen_addr`: Local address to bind (e.g., `127.0.0.1:3000`)
//!
//! # Options
//! - `--peer <addr>`: Peer address to connect to on startup (repeatable)
//! - `--difficulty <n>`: Leading zero hex digits required of a proof
//! - `--heartbeat-secs <n>`: Seconds between liveness probes
//! - `--key <hex>`: 64-hex-char shared key sealing peer traffic
//! - `--zone <name>`: Zone name this node's relay channel is created under
//! - `--relay-retry <n>`: Attempts before a relay send gives up
//! - `--relay-backoff-ms <n>`: Milliseconds between relay send attempts
//! - `--mine`: Mine blocks from the local transaction pool
//! - `--quiet`: Only log warnings and errors

use crate::config::{ConfigError, NodeConfig};
use crate::core::miner::Miner;
use crate::network::message::Message;
use crate::network::server::{NodeState, PeerNetwork};
use crate::relay::zone_relay::ZoneRelay;
use std::env;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

mod config;
mod core;
mod crypto;
mod network;
mod relay;
mod types;
mod utils;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let listen_addr: SocketAddr = match args[1].parse() {
        Ok(addr) => addr,
        Err(_) => {
            eprintln!("Invalid listen address: {}", args[1]);
            process::exit(1);
        }
    };

    let mut config = NodeConfig::new(listen_addr);

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--peer" => {
                i += 1;
                let Some(raw) = args.get(i) else {
                    eprintln!("--peer requires an argument");
                    process::exit(1);
                };
                match raw.parse() {
                    Ok(addr) => config.seed_peers.push(addr),
                    Err(_) => {
                        eprintln!("Invalid peer address: {raw}");
                        process::exit(1);
                    }
                }
                i += 1;
            }
            "--difficulty" => {
                i += 1;
                let Some(raw) = args.get(i) else {
                    eprintln!("--difficulty requires an argument");
                    process::exit(1);
                };
                match raw.parse() {
                    Ok(n) => config.difficulty = n,
                    Err(_) => {
                        eprintln!("Invalid difficulty: {raw}");
                        process::exit(1);
                    }
                }
                i += 1;
            }
            "--heartbeat-secs" => {
                i += 1;
                let Some(raw) = args.get(i) else {
                    eprintln!("--heartbeat-secs requires an argument");
                    process::exit(1);
                };
                match raw.parse::<u64>() {
                    Ok(n) => config.heartbeat_interval = Duration::from_secs(n),
                    Err(_) => {
                        eprintln!("Invalid heartbeat interval: {raw}");
                        process::exit(1);
                    }
                }
                i += 1;
            }
            "--key" => {
                i += 1;
                let Some(raw) = args.get(i) else {
                    eprintln!("--key requires an argument");
                    process::exit(1);
                };
                match NodeConfig::parse_shared_key(raw) {
                    Ok(key) => config.shared_key = key,
                    Err(ConfigError::InvalidKey(_)) => {
                        eprintln!("Invalid shared key: expected 64 hex characters");
                        process::exit(1);
                    }
                }
                i += 1;
            }
            "--zone" => {
                i += 1;
                let Some(raw) = args.get(i) else {
                    eprintln!("--zone requires an argument");
                    process::exit(1);
                };
                config.zone = raw.clone();
                i += 1;
            }
            "--relay-retry" => {
                i += 1;
                let Some(raw) = args.get(i) else {
                    eprintln!("--relay-retry requires an argument");
                    process::exit(1);
                };
                match raw.parse() {
                    Ok(n) => config.relay_retry_limit = n,
                    Err(_) => {
                        eprintln!("Invalid relay retry limit: {raw}");
                        process::exit(1);
                    }
                }
                i += 1;
            }
            "--relay-backoff-ms" => {
                i += 1;
                let Some(raw) = args.get(i) else {
                    eprintln!("--relay-backoff-ms requires an argument");
                    process::exit(1);
                };
                match raw.parse::<u64>() {
                    Ok(n) => config.relay_backoff = Duration::from_millis(n),
                    Err(_) => {
                        eprintln!("Invalid relay backoff: {raw}");
                        process::exit(1);
                    }
                }
                i += 1;
            }
            "--mine" => {
                config.mine = true;
                i += 1;
            }
            "--quiet" => {
                crate::utils::log::set_min_level(crate::utils::log::Level::Warn);
                i += 1;
            }
            other => {
                eprintln!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    let state = Arc::new(NodeState::new(config.difficulty));
    let network = PeerNetwork::new(&config.shared_key, Arc::clone(&state));

    let bound = match network.listen(config.listen_addr).await {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Failed to start listener: {e}");
            process::exit(1);
        }
    };
    info!("node started on {bound}");

    let relay = Arc::new(ZoneRelay::new(config.relay_retry_limit, config.relay_backoff));
    if let Err(e) = relay.create_channel(&config.zone) {
        eprintln!("Failed to open relay channel: {e}");
        process::exit(1);
    }
    info!("relay channel open for zone {}", config.zone);

    for addr in &config.seed_peers {
        let max_attempts = 5;
        for attempt in 1..=max_attempts {
            match network.connect(*addr).await {
                Ok(()) => break,
                Err(e) => {
                    error!("failed to connect to {addr} (attempt {attempt}/{max_attempts}): {e}");
                    if attempt == max_attempts {
                        break;
                    }
                    sleep(Duration::from_millis(500)).await;
                }
            }
        }
    }

    // Catch up with whichever peers we reached.
    network.broadcast(&Message::GetChain).await;
    network.spawn_heartbeat(config.heartbeat_interval);

    if config.mine {
        let network_for_miner = Arc::clone(&network);
        let state_for_miner = Arc::clone(&state);
        tokio::spawn(async move {
            let miner = Arc::new(Miner::new());
            loop {
                let state = Arc::clone(&state_for_miner);
                let miner = Arc::clone(&miner);
                let mined = tokio::task::spawn_blocking(move || {
                    miner.mine(&state.ledger, &state.pool)
                })
                .await
                .ok()
                .flatten();

                if let Some(block) = mined {
                    network_for_miner.broadcast(&Message::Block(block)).await;
                } else {
                    sleep(Duration::from_secs(1)).await;
                }
            }
        });
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to setup Ctrl+C handler: {}", e);
        return;
    }
    info!("Ctrl+C received, shutting down...");
}

const USAGE: &str = "\
Zone Node

USAGE:
    {program} <listen_addr> [OPTIONS]

ARGS:
    <listen_addr>    Local address to bind (e.g., 127.0.0.1:3000)

OPTIONS:
    --peer <addr>           Peer address to connect to on startup (repeatable)
    --difficulty <n>        Leading zero hex digits required of a proof (default 4)
    --heartbeat-secs <n>    Seconds between liveness probes (default 10)
    --key <hex>             64-hex-char shared key sealing peer traffic
    --zone <name>           Zone name for this node's relay channel (default local)
    --relay-retry <n>       Attempts before a relay send gives up (default 3)
    --relay-backoff-ms <n>  Milliseconds between relay send attempts (default 200)
    --mine                  Mine blocks from the local transaction pool
    --quiet                 Only log warnings and errors
    -h, --help              Print this help message

EXAMPLES:
    # Start a single mining node
    {program} 127.0.0.1:3000 --mine

    # Join an existing zone
    {program} 127.0.0.1:3001 --peer 127.0.0.1:3000
";

fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
