use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "cimserver",
    about = "CIM broker: authenticated object-stream endpoint",
    version,
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Bind address as host[:port], overriding the configuration
    #[arg(short, long)]
    pub bind: Option<String>,
}
