//! Configuration management for FinLens.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;

/// Default bind address for the web server.
pub const DEFAULT_BIND: &str = "127.0.0.1:3030";

/// Which contract the analyze endpoint honors.
///
/// A deployment picks exactly one mode at startup; the two are never mixed
/// within a running server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzeMode {
    /// Block the request until analysis completes and return the result.
    #[default]
    Sync,
    /// Acknowledge immediately and run analysis in a background task.
    /// The result is only observable in the server logs.
    Queued,
}

/// Server section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Endpoint contract for POST /analyze.
    #[serde(default)]
    pub analyze_mode: AnalyzeMode,
}

/// On-disk configuration file format (`<data_dir>/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    pub server: ServerConfig,
    pub llm: LlmConfig,
}

impl Settings {
    /// Directory holding transient uploaded documents.
    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Path to the configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }
}

/// Load settings from `<data_dir>/config.toml`.
///
/// A missing config file is not an error; defaults apply. The data directory
/// is taken from the CLI flag, then `FINLENS_DATA_DIR`, then `./data`.
pub fn load_settings(cli_data_dir: Option<PathBuf>) -> anyhow::Result<Settings> {
    let data_dir = resolve_data_dir(cli_data_dir);
    let config_path = data_dir.join("config.toml");

    let config = if config_path.exists() {
        let raw = fs::read_to_string(&config_path)?;
        toml::from_str::<Config>(&raw)
            .map_err(|e| anyhow::anyhow!("invalid config at {}: {}", config_path.display(), e))?
    } else {
        Config::default()
    };

    Ok(Settings {
        data_dir,
        server: config.server,
        llm: config.llm,
    })
}

fn resolve_data_dir(cli_data_dir: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = cli_data_dir {
        return expand_path(dir);
    }
    if let Ok(dir) = std::env::var("FINLENS_DATA_DIR") {
        if !dir.is_empty() {
            return expand_path(PathBuf::from(dir));
        }
    }
    PathBuf::from("data")
}

/// Expand `~` in user-supplied paths.
fn expand_path(path: PathBuf) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).into_owned())
}
