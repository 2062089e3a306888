//! Configuration loading and setting resolution
//!
//! Every setting is resolved in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: the tool warns and continues on
//! defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "echo-etl.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ECHO_CONFIG";

/// Contents of `echo-etl.toml`
///
/// All top-level connection settings are optional so that environment
/// variables and CLI flags can fill the gaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Analytics API base URL, e.g. `https://dhis2.example.org/api/29`
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Directory that receives the CSV outputs and the `Backup/` tree
    pub output_dir: Option<PathBuf>,
    /// Maximum concurrent analytics calls per retrieval pass
    pub concurrency: Option<usize>,
    /// Request rate ceiling shared by all analytics calls
    pub requests_per_second: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub logging: LoggingConfig,
    pub program: ProgramConfig,
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Program-specific identifiers and period bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    /// Display name of the organisation unit group that scopes every query
    pub org_unit_group: String,
    /// Case-insensitive substring selecting the exported indicator group sets
    pub indicator_group_set_pattern: String,
    /// Display name of the data element group set holding exported groups
    pub data_element_group_set: String,
    /// Display name of the data element group holding annual targets
    pub target_data_element_group: String,
    /// First year of the period lattice
    pub first_year: i32,
    /// First monthly period queried (inclusive)
    pub first_month: String,
    /// First quarterly period queried (inclusive)
    pub first_quarter: String,
    /// Targets are expanded only into sub-periods from this year onward
    pub target_start_year: i32,
    /// Fixed UTC offset used for the program-local update timestamp
    pub utc_offset_hours: i32,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            org_unit_group: "ECHO Sites".to_string(),
            indicator_group_set_pattern: "export".to_string(),
            data_element_group_set: "ECHO EXPORT".to_string(),
            target_data_element_group: "ECHO MOZ | Targets".to_string(),
            first_year: 2019,
            first_month: "201909".to_string(),
            first_quarter: "2019Q4".to_string(),
            target_start_year: 2020,
            utc_offset_hours: 2,
        }
    }
}

/// Compiled fallback values for settings not found anywhere else
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub base_url: String,
    pub output_dir: PathBuf,
    pub concurrency: usize,
    pub requests_per_second: u32,
    pub timeout_secs: u64,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            base_url: "https://dhis2.echomoz.org/api/29".to_string(),
            output_dir: default_output_dir(),
            concurrency: 4,
            requests_per_second: 10,
            timeout_secs: 60,
        }
    }
}

/// `~/.local/share/echo` (or the platform equivalent)
fn default_output_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("echo"))
        .unwrap_or_else(|| PathBuf::from("./echo_data"))
}

/// Locate the config file: explicit path, then `ECHO_CONFIG`, then the
/// per-user config directory.
pub fn locate_config_file(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("echo").join(CONFIG_FILE_NAME))
}

/// Load a TOML config file
///
/// A missing file yields defaults with a warning; a file that exists but
/// cannot be read or parsed is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found: {} (using defaults)", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Resolve one setting through CLI → ENV → TOML → default
///
/// An environment value that fails to parse is reported as invalid input
/// rather than silently skipped.
pub fn resolve_setting<T>(
    name: &str,
    cli_value: Option<T>,
    env_var_name: &str,
    toml_value: Option<T>,
    default: T,
) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = cli_value {
        debug!(setting = name, "Resolved from command line");
        return Ok(value);
    }

    if let Ok(raw) = std::env::var(env_var_name) {
        if is_present(&raw) {
            let value = raw.trim().parse::<T>().map_err(|e| {
                Error::InvalidInput(format!("{}={}: {}", env_var_name, raw, e))
            })?;
            debug!(setting = name, "Resolved from environment");
            return Ok(value);
        }
    }

    if let Some(value) = toml_value {
        debug!(setting = name, "Resolved from TOML config");
        return Ok(value);
    }

    debug!(setting = name, "Using compiled default");
    Ok(default)
}

/// Resolve a required secret-like string (no compiled default)
pub fn resolve_required(
    name: &str,
    cli_value: Option<String>,
    env_var_name: &str,
    toml_value: Option<String>,
) -> Result<String> {
    let value = cli_value
        .filter(|v| is_present(v))
        .or_else(|| std::env::var(env_var_name).ok().filter(|v| is_present(v)))
        .or_else(|| toml_value.filter(|v| is_present(v)));

    value.ok_or_else(|| {
        Error::Config(format!(
            "{} not configured. Set {} or add `{}` to {}",
            name, env_var_name, name, CONFIG_FILE_NAME
        ))
    })
}

/// Non-empty, non-whitespace
pub fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}
