use clap::Parser;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tecra_api::{start_server, ApiState, Node};
use tecra_cli::config::NodeConfig;
use tecra_cli::init_logging;
use tecra_core::Network;

#[derive(Parser)]
#[command(name = "tecrad")]
#[command(about = "Tecra Node", version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// mainnet, testnet or regtest; overrides the config file
    #[arg(short, long)]
    network: Option<Network>,

    /// RPC listen address; overrides the config file
    #[arg(long, value_name = "ADDR")]
    rpc_bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    let mut config = match &cli.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    if let Some(network) = cli.network {
        config.node.network = network;
    }
    if let Some(bind) = cli.rpc_bind {
        config.node.rpc_bind = Some(bind);
    }

    let params = config.consensus_params()?;
    let addr = config.rpc_addr()?;

    println!("{}", format!("Tecra Node v{}", env!("CARGO_PKG_VERSION")).cyan().bold());
    println!("{}: {}", "Network".yellow().bold(), params.network);
    println!("{}: {}", "RPC".yellow().bold(), addr);
    println!(
        "{}: {} COIN collateral, {}% of the block reward",
        "Tnodes".yellow().bold(),
        params.tnode_collateral / tecra_core::COIN,
        params.tnode_reward_percent
    );
    println!("{}: from block {}", "Sigma".yellow().bold(), params.sigma_start_height);

    let mut node = Node::new(params);
    if let Some(path) = config.tnode_conf_path() {
        let count = node.load_tnode_config(&path)?;
        println!("{}: {} entries in {}", "tnode.conf".yellow().bold(), count, path.display());
    }

    println!("\n{}", "Node Status: ACTIVE".green().bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    start_server(addr, ApiState::new(node)).await
}
