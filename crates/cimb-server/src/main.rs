use clap::Parser;

use cimb_server::{CimServer, ServerConfig};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = cli::Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.apply_bind(bind)?;
    }

    CimServer::new(config).serve().await?;
    Ok(())
}
