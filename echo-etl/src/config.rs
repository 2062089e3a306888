//! Configuration resolution for echo-etl
//!
//! **Priority:** command line → environment → TOML → compiled default,
//! per setting. The password is never accepted on the command line.

use crate::error::EtlResult;
use crate::models::{Cadence, Period};
use crate::services::analytics_client::ClientSettings;
use clap::Parser;
use echo_common::config::{
    resolve_required, resolve_setting, CompiledDefaults, ProgramConfig, TomlConfig,
};
use echo_common::Error;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_BASE_URL: &str = "ECHO_BASE_URL";
pub const ENV_USERNAME: &str = "ECHO_DHIS2_USERNAME";
pub const ENV_PASSWORD: &str = "ECHO_DHIS2_PASSWORD";
pub const ENV_OUTPUT_DIR: &str = "ECHO_OUTPUT_DIR";
pub const ENV_CONCURRENCY: &str = "ECHO_CONCURRENCY";
pub const ENV_REQUESTS_PER_SECOND: &str = "ECHO_REQUESTS_PER_SECOND";
pub const ENV_TIMEOUT_SECS: &str = "ECHO_TIMEOUT_SECS";

/// Command-line arguments
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "echo-etl", version, about = "Extract ECHO program metrics from the analytics API")]
pub struct Cli {
    /// Path to echo-etl.toml (default: ECHO_CONFIG, then the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Analytics API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long)]
    pub username: Option<String>,

    /// Directory for CSV outputs and backups
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Concurrent analytics calls per retrieval pass
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Request rate ceiling for the analytics API
    #[arg(long)]
    pub requests_per_second: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub client: ClientSettings,
    pub output_dir: PathBuf,
    pub concurrency: usize,
    pub program: ProgramConfig,
    pub log_level: String,
}

impl EtlConfig {
    pub fn resolve(cli: &Cli, toml: &TomlConfig) -> EtlResult<Self> {
        let defaults = CompiledDefaults::for_current_platform();

        let base_url = resolve_setting(
            "base_url",
            cli.base_url.clone(),
            ENV_BASE_URL,
            toml.base_url.clone(),
            defaults.base_url,
        )?;
        let username = resolve_required("username", cli.username.clone(), ENV_USERNAME, toml.username.clone())?;
        let password = resolve_required("password", None, ENV_PASSWORD, toml.password.clone())?;
        let output_dir = resolve_setting(
            "output_dir",
            cli.output_dir.clone(),
            ENV_OUTPUT_DIR,
            toml.output_dir.clone(),
            defaults.output_dir,
        )?;
        let concurrency = resolve_setting(
            "concurrency",
            cli.concurrency,
            ENV_CONCURRENCY,
            toml.concurrency,
            defaults.concurrency,
        )?;
        let requests_per_second = resolve_setting(
            "requests_per_second",
            cli.requests_per_second,
            ENV_REQUESTS_PER_SECOND,
            toml.requests_per_second,
            defaults.requests_per_second,
        )?;
        let timeout_secs = resolve_setting(
            "timeout_secs",
            cli.timeout_secs,
            ENV_TIMEOUT_SECS,
            toml.timeout_secs,
            defaults.timeout_secs,
        )?;

        if concurrency == 0 {
            return Err(Error::InvalidInput("concurrency must be at least 1".to_string()).into());
        }
        let requests_per_second = NonZeroU32::new(requests_per_second)
            .ok_or_else(|| Error::InvalidInput("requests_per_second must be at least 1".to_string()))?;

        validate_program(&toml.program)?;

        Ok(Self {
            client: ClientSettings {
                base_url,
                username,
                password,
                timeout: Duration::from_secs(timeout_secs),
                requests_per_second,
            },
            output_dir,
            concurrency,
            program: toml.program.clone(),
            log_level: toml.logging.level.clone(),
        })
    }
}

/// Period bounds must be well-formed and of the right cadence
pub fn validate_program(program: &ProgramConfig) -> EtlResult<()> {
    let check = |name: &str, token: &str, cadence: Cadence| -> EtlResult<()> {
        let period = Period::parse(token)?;
        if period.cadence() != cadence {
            return Err(Error::InvalidInput(format!(
                "program.{} = {} is {}, expected {}",
                name,
                token,
                period.cadence(),
                cadence
            ))
            .into());
        }
        Ok(())
    };

    check("first_month", &program.first_month, Cadence::Monthly)?;
    check("first_quarter", &program.first_quarter, Cadence::Quarterly)?;

    if program.target_start_year < program.first_year {
        return Err(Error::InvalidInput(format!(
            "program.target_start_year {} precedes first_year {}",
            program.target_start_year, program.first_year
        ))
        .into());
    }
    Ok(())
}
