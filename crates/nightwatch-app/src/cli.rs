//! CLI argument definitions for the Nightwatch binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use nightwatch_core::config::NightwatchConfig;

/// Nightwatch: ask security-operations questions about Log Analytics and NSG flow logs.
#[derive(Parser, Debug, Default)]
#[command(name = "nightwatch", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Directory of the persisted flow-log vector index.
    #[arg(long = "index-path")]
    pub index_path: Option<PathBuf>,

    /// Skip building the vector index at startup.
    #[arg(long = "no-warm")]
    pub no_warm: bool,

    /// Answer one question and exit.
    #[arg(short = 'q', long = "query")]
    pub query: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > NIGHTWATCH_CONFIG env var > ~/.nightwatch/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("NIGHTWATCH_CONFIG") {
            if !p.trim().is_empty() {
                return PathBuf::from(p);
            }
        }
        default_config_path()
    }

    /// Overlay CLI flags on a config that already carries file and env values.
    pub fn apply(&self, config: &mut NightwatchConfig) {
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(ref path) = self.index_path {
            config.index.path = path.to_string_lossy().to_string();
        }
        if self.no_warm {
            config.index.eager_build = false;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".nightwatch").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".nightwatch").join("config.toml");
    }
    PathBuf::from("config.toml")
}
