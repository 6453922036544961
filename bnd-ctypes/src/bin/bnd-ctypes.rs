//! CLI entry point for bnd-ctypes.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// bnd-ctypes: generate a Python ctypes module from C headers.
#[derive(Parser, Debug)]
#[command(name = "bnd-ctypes", version, about)]
struct Cli {
    /// Path to the bnd-ctypes.toml configuration file.
    #[arg(default_value = "bnd-ctypes.toml")]
    config: PathBuf,

    /// Output file path (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bnd_ctypes=info")),
        )
        .init();

    let cli = Cli::parse();
    bnd_ctypes::run(&cli.config, cli.output.as_deref())?;
    Ok(())
}
