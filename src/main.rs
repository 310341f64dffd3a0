#![cfg(not(tarpaulin_include))]

use clap::Parser;
use env_logger::Env;
use predictables::{Settings, app};
use std::path::PathBuf;

/// Predictables web server
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Config file to read instead of ./predictables.{toml,yaml,json}
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configured one
    #[arg(short, long)]
    bind: Option<String>,
}

/// Main entry point for the web application
///
/// Loads settings, applies command line overrides and runs the server until
/// it is stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::new()?,
    };
    if let Some(bind) = args.bind {
        settings.bind_addr = bind;
    }

    app::run(settings).await
}
