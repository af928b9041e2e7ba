//! skytrack entry point
//!
//! Initializes logging, loads configuration from the environment (with
//! optional bind overrides from the command line), connects the store, and
//! serves until the process is stopped.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use skytrack::config::ServiceConfig;
use skytrack::http_server::HttpServer;
use skytrack::store::SignalStore;

#[derive(Debug, Parser)]
#[command(name = "skytrack", about = "Real-time drone signal ingestion and fan-out service")]
struct Args {
    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let store = match SignalStore::connect(&config.database_url).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = HttpServer::new(config, store).start().await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
