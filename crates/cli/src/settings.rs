//! Layered settings and logging setup for the `dataroom` binary.
//!
//! Precedence, lowest first: built-in defaults, the TOML config file,
//! `DATAROOM_*` environment variables, command-line flags.

use anyhow::{bail, Context, Result};
use clap::Args;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use dataroom_core::ServiceConfig;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const ENV_PREFIX: &str = "DATAROOM";
const APP_DIR: &str = "dataroom";

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to a TOML configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory of the sled database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. "info", "dataroom_core=debug")
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format: pretty or json
    #[arg(long, global = true)]
    pub log_format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => bail!("unknown log format {other:?} (expected pretty or json)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_format: LogFormat,
    pub service: ServiceConfig,
}

impl Settings {
    pub fn load(args: &GlobalArgs) -> Result<Self> {
        let resolved_path = match &args.config {
            Some(path) => {
                if !path.exists() {
                    bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path.clone())
            }
            None => default_config_path().filter(|p| p.exists()),
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option(
                "db_path",
                args.db_path.as_ref().map(|p| p.display().to_string()),
            )?
            .set_override_option("log_level", args.log_level.clone())?
            .set_override_option("log_format", args.log_format.clone())?;

        let config = builder.build().context("failed to assemble configuration")?;
        Self::from_config(&config)
    }

    fn from_config(config: &Config) -> Result<Self> {
        let db_path = config
            .get_string("db_path")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_db_path());
        let log_level = config
            .get_string("log_level")
            .unwrap_or_else(|_| "info".to_string());
        let log_format = config
            .get_string("log_format")
            .unwrap_or_else(|_| "pretty".to_string())
            .parse()?;

        let defaults = ServiceConfig::default();
        // 0 turns expiry off, so an environment override can disable it.
        let token_max_age_secs = optional_u64(config, "token_max_age_secs")?.filter(|s| *s > 0);
        let token_max_clock_skew_secs = optional_u64(config, "token_max_clock_skew_secs")?
            .unwrap_or(defaults.token_max_clock_skew_secs);

        Ok(Self {
            db_path,
            log_level,
            log_format,
            service: ServiceConfig {
                token_max_age_secs,
                token_max_clock_skew_secs,
            },
        })
    }
}

fn optional_u64(config: &Config, key: &str) -> Result<Option<u64>> {
    match config.get_int(key) {
        Ok(value) => u64::try_from(value)
            .map(Some)
            .with_context(|| format!("{key} must not be negative")),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("invalid value for {key}")),
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("db")
}

/// Install the global tracing subscriber. Logs go to stderr so command
/// output on stdout stays machine readable.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    match settings.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
    .context("failed to install tracing subscriber")?;

    Ok(())
}
