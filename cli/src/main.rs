//! netrpc CLI: query and follow wallet networks from the terminal.
//!
//! Usage:
//! ```bash
//! # Send one JSON-RPC call through the full pipeline
//! netrpc call --network mainnet --credential $PROJECT_ID --method eth_blockNumber
//!
//! # Custom endpoint, with params
//! netrpc call --rpc-url http://localhost:8545 --chain-id 0x539 \
//!     --method eth_getBalance --params '["0xabc…", "latest"]'
//!
//! # Print new chain heads until Ctrl-C
//! netrpc track --network goerli --credential $PROJECT_ID
//!
//! # List built-in networks
//! netrpc networks
//! ```

mod config;
mod logging;

use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context};
use serde_json::Value;

use netrpc_core::request::JsonRpcRequest;
use netrpc_network::{NetworkConfiguration, NetworkController, KNOWN_NETWORKS};

use crate::config::FileConfig;

/// Environment variable consulted when `--credential` is not given.
const CREDENTIAL_ENV: &str = "NETRPC_CREDENTIAL";

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "call" => cmd_call(&args[2..]).await,
        "track" => cmd_track(&args[2..]).await,
        "networks" => {
            cmd_networks();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("netrpc {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("netrpc {}", env!("CARGO_PKG_VERSION"));
    println!("Query and follow wallet networks\n");
    println!("USAGE:");
    println!("    netrpc <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    call       Send one JSON-RPC call");
    println!("    track      Print new chain heads until interrupted");
    println!("    networks   List built-in networks");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("NETWORK FLAGS (call, track):");
    println!("    --config <FILE>       TOML configuration file");
    println!("    --network <NAME>      Built-in network name");
    println!("    --rpc-url <URL>       Custom endpoint (with --chain-id)");
    println!("    --chain-id <HEX>      Chain id of the custom endpoint");
    println!("    --credential <ID>     Gateway credential  [env: {CREDENTIAL_ENV}]\n");
    println!("CALL FLAGS:");
    println!("    --method <NAME>       JSON-RPC method  [required]");
    println!("    --params <JSON>       JSON array of params  [default: []]");
}

/// Load config, initialise logging, and activate the selected network.
fn connect(args: &[String]) -> anyhow::Result<NetworkController> {
    let file = match parse_flag(args, "--config") {
        Some(path) => FileConfig::load(&PathBuf::from(path))?,
        None => FileConfig::default(),
    };
    file.log.init()?;

    let network = if let Some(name) = parse_flag(args, "--network") {
        NetworkConfiguration::known(&name)?
    } else if let Some(url) = parse_flag(args, "--rpc-url") {
        let chain_id = parse_flag(args, "--chain-id").context("--rpc-url needs --chain-id")?;
        NetworkConfiguration::rpc(&url, &chain_id)?
    } else if let Some(network) = file.network.clone() {
        network
    } else {
        bail!("select a network with --network, --rpc-url or a [network] table in --config");
    };

    let credential = parse_flag(args, "--credential").or_else(|| env::var(CREDENTIAL_ENV).ok());
    let controller = NetworkController::new(file.controller(credential), file.http());
    tracing::debug!(%network, "activating network");
    controller.set_provider_config(network)?;
    Ok(controller)
}

async fn cmd_call(args: &[String]) -> anyhow::Result<()> {
    let method = parse_flag(args, "--method").context("--method is required")?;
    let params: Vec<Value> = match parse_flag(args, "--params") {
        Some(raw) => serde_json::from_str(&raw).context("--params must be a JSON array")?,
        None => vec![],
    };

    let controller = connect(args)?;
    let (engine, _tracker) = controller.get_provider_and_block_tracker()?;

    let resp = engine
        .submit(JsonRpcRequest::unnumbered(method, params))
        .await?;
    match resp.into_result() {
        Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        Err(err) => bail!("{err}"),
    }
    Ok(())
}

async fn cmd_track(args: &[String]) -> anyhow::Result<()> {
    let controller = connect(args)?;
    let (engine, tracker) = controller.get_provider_and_block_tracker()?;
    let mut heads = tracker.subscribe();

    println!("Following {} (Ctrl-C to stop)...", engine.label());
    loop {
        tokio::select! {
            changed = heads.changed() => {
                if changed.is_err() {
                    bail!("block tracker stopped");
                }
                let head = *heads.borrow_and_update();
                if let Some(number) = head {
                    println!("  block {number} (0x{number:x})  health: {}", tracker.health());
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.destroy();
    Ok(())
}

fn cmd_networks() {
    println!("Built-in networks:\n");
    for network in KNOWN_NETWORKS {
        println!(
            "  {:<10} chain {:<10} https://{}/v3/<credential>",
            network.name, network.chain_id, network.gateway_host
        );
    }
    println!();
    println!("  rpc        any endpoint: --rpc-url <URL> --chain-id <HEX>");
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}
