//! `strata` command-line entry point.

use anyhow::Context;
use clap::Parser;
use log::{debug, info};
use strata_rs::cli::{Cli, run};
use strata_rs::config::StrataConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    strata_rs::init_logging();

    let cli = Cli::parse();
    let config = if let Some(path) = cli.config.as_ref() {
        info!("loading config from path: {}", path.display());
        StrataConfig::load_from_path(path).context("failed to load config")?
    } else {
        let cwd = std::env::current_dir().context("cwd")?;
        info!("loading layered config from cwd: {}", cwd.display());
        let layered = StrataConfig::load_layered(&cwd).context("failed to load layered config")?;
        debug!("layered config loaded (layers={})", layered.layers.len());
        layered.config
    };

    let storage = strata_rs::open_storage(&config)?;
    let output = run(&storage, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
