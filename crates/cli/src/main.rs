mod op;
mod ops;

use clap::Parser;
use client::config::ClientConfig;
use ops::{Browse, Migrate, NewFolder, Status, Upload};

command_enum! {
    (Status, Status),
    (Browse, Browse),
    (Upload, Upload),
    (NewFolder, NewFolder),
    (Migrate, Migrate),
}

#[derive(Parser, Debug)]
#[command(name = "forge-assets", version, about = "Client for the Forge asset library")]
struct Args {
    /// Service hostname (e.g. forge-vtt.com); derives the API, asset, and
    /// upload endpoints
    #[arg(long, global = true)]
    hostname: Option<String>,

    /// API key; falls back to the FORGE_API_KEY environment variable
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::default();
    if let Some(hostname) = &args.hostname {
        config = match config.with_hostname(hostname) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: invalid hostname {hostname:?}: {}", e);
                std::process::exit(1);
            }
        };
    }
    config.api_key = args
        .api_key
        .clone()
        .or_else(|| std::env::var("FORGE_API_KEY").ok());

    let ctx = match op::OpContext::new(config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: failed to create API client: {}", e);
            std::process::exit(1);
        }
    };

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
