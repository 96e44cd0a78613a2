//! Tecra CLI - send one RPC call to a running tecrad

use clap::Parser;
use tecra_cli::client::{parse_param, RpcClient};

#[derive(Parser)]
#[command(name = "tecra-cli")]
#[command(about = "Tecra node RPC client", version)]
struct Cli {
    /// RPC endpoint
    #[arg(short, long, default_value = "http://127.0.0.1:24101")]
    rpc: String,

    /// RPC method, e.g. getblockcount or tnode
    method: String,

    /// Positional parameters; JSON values are passed through, anything else as a string
    params: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let client = RpcClient::new(cli.rpc);
    let params = cli.params.iter().map(|p| parse_param(p)).collect();

    match client.call(&cli.method, params).await {
        Ok(serde_json::Value::String(s)) => println!("{}", s),
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
