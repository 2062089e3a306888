//! echo-etl - ECHO analytics extraction
//!
//! One run: resolve program references, pull indicator, data-element and
//! target metrics from the analytics API, reconcile periods, and write
//! `dataValues.csv` plus `dataUpdateDatetime.csv` to the output directory.

use anyhow::{Context, Result};
use clap::Parser;
use echo_common::config::{load_toml_config, locate_config_file, TomlConfig};
use echo_etl::config::{Cli, EtlConfig};
use echo_etl::Pipeline;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config is read before tracing starts so its log level can seed the filter
    let config_path = locate_config_file(cli.config.as_deref());
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => TomlConfig::default(),
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&toml_config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting echo-etl v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        Some(path) => warn!("Config file not found: {} (using defaults)", path.display()),
        None => warn!("No config directory available (using defaults)"),
    }

    let config = EtlConfig::resolve(&cli, &toml_config).context("Invalid configuration")?;
    info!(
        base_url = %config.client.base_url,
        output_dir = %config.output_dir.display(),
        concurrency = config.concurrency,
        requests_per_second = config.client.requests_per_second.get(),
        "Configuration resolved"
    );

    let pipeline = Pipeline::new(config)?;
    let report = pipeline.run(echo_common::time::now()).await?;

    info!(
        rows = report.output_rows,
        indicator_starved = report.indicator_starved.len(),
        data_element_starved = report.data_element_starved.len(),
        dropped_targets = report.dropped_targets,
        "✓ Wrote outputs to {}",
        pipeline.output_dir().display()
    );

    Ok(())
}
