mod api;
mod auth;
mod catalog;
mod config;
mod credits;
mod ingest;
mod models;
mod normalize;
mod openapi;
mod startup;
mod state;
mod storage;
mod tags;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flacvault")]
struct Args {
    /// HTTP bind address, e.g. 0.0.0.0:8080
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,

    /// Server config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,actix_web=info,flacvault=info")
        }))
        .init();

    let cfg = match args.config.as_ref() {
        Some(path) => config::ServerConfig::load(path)?,
        None => {
            let auto_path = std::env::current_exe()
                .ok()
                .and_then(|path| path.parent().map(|dir| dir.join("config.toml")));
            match auto_path {
                Some(path) if path.exists() => config::ServerConfig::load(&path)?,
                _ => return Err(anyhow::anyhow!("config file is required; use --config")),
            }
        }
    };

    let bind = match args.bind {
        Some(addr) => addr,
        None => config::bind_from_config(&cfg)?
            .unwrap_or_else(|| "0.0.0.0:8080".parse().expect("default bind")),
    };

    startup::run(cfg, bind).await
}
