use anyhow::Result;
use clap::Parser;

use wallgrid::{cli::Cli, config::Config, setter};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = Config::load(&cli)?;
    setter::run(config).await
}
