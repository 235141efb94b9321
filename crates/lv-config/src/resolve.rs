//! Job config resolution.
//!
//! Precedence, highest first: CLI flags (clap also folds in `LV_*`
//! environment variables), the JSON config file, built-in defaults.

use crate::job::{ConfigError, JobConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file name inside the per-user config directory.
const CONFIG_FILE_NAME: &str = "config.json";

/// Directory name inside the platform config directory.
const CONFIG_DIR_NAME: &str = "longitudinal";

/// Settings supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub input_root: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub histograms_path: Option<PathBuf>,
    pub sources_path: Option<PathBuf>,
    pub input_stream: Option<String>,
    pub max_file_bytes: Option<u64>,
    pub batch_rows: Option<usize>,
    pub workers: Option<usize>,
}

/// `$XDG_CONFIG_HOME/longitudinal/config.json` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Resolve the job config from overrides, an optional config file, and defaults.
///
/// An explicitly named config file must exist; the default location is
/// skipped when absent.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<JobConfig, ConfigError> {
    let mut config = match &overrides.config_path {
        Some(path) => load_file(path)?,
        None => match default_config_path() {
            Some(path) if path.is_file() => load_file(&path)?,
            _ => JobConfig::default(),
        },
    };

    if let Some(v) = &overrides.input_root {
        config.input_root = v.clone();
    }
    if let Some(v) = &overrides.output_root {
        config.output_root = v.clone();
    }
    if let Some(v) = &overrides.histograms_path {
        config.histograms_path = v.clone();
    }
    if let Some(v) = &overrides.sources_path {
        config.sources_path = v.clone();
    }
    if let Some(v) = &overrides.input_stream {
        config.input_stream = v.clone();
    }
    if let Some(v) = overrides.max_file_bytes {
        config.max_file_bytes = v;
    }
    if let Some(v) = overrides.batch_rows {
        config.batch_rows = v;
    }
    if let Some(v) = overrides.workers {
        config.workers = v;
    }

    config.validate()?;
    Ok(config)
}

fn load_file(path: &Path) -> Result<JobConfig, ConfigError> {
    debug!(path = %path.display(), "loading job config");
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}
