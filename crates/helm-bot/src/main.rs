use clap::Parser;
use tracing::info;

use helm_bot::{logging, AppConfig, Application};

#[derive(Parser, Debug)]
#[command(name = "helm-bot", version, about = "Algorithmic trading control plane")]
struct Args {
    /// Path to the TOML config file. Falls back to HELM_CONFIG, then
    /// config/default.toml.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();

    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref())?;
    info!(mode = ?config.mode, interval = config.cycle_interval_secs, "starting helm-bot");

    let mut app = Application::new(config)?;
    app.run().await?;
    Ok(())
}
