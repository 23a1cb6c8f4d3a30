use anyhow::Result;
use atelier::cli::{dispatch, Cli};
use atelier::config::AtelierConfig;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    let config = AtelierConfig::load_or_init()?;
    dispatch(cli, config).await
}
