use crate::cli::Args;
use crate::error::{AppError, Result};
use restream_engine::{DEFAULT_FFMPEG, DEFAULT_GRACE_PERIOD};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub ffmpeg_path: Option<String>,
    pub grace_period_secs: Option<u64>,
    /// Extra ffmpeg arguments placed before `-i`
    pub input_args: Vec<String>,
    /// Extra ffmpeg arguments placed after `-c copy`
    pub output_args: Vec<String>,
    pub loop_playlist: bool,
    pub loop_video: bool,
}

impl AppConfig {
    /// Load `explicit` if given, otherwise the default location if it exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| AppError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("restream").join("config.toml"))
    }
}

/// Effective settings after command-line flags are applied over the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub ffmpeg_path: String,
    pub grace_period: Duration,
    pub input_args: Vec<String>,
    pub output_args: Vec<String>,
    pub loop_playlist: bool,
    pub loop_video: bool,
}

impl Settings {
    pub fn resolve(args: &Args, config: AppConfig) -> Self {
        let grace_period = args
            .grace_period
            .or(config.grace_period_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_GRACE_PERIOD);

        Self {
            ffmpeg_path: args
                .ffmpeg
                .clone()
                .or(config.ffmpeg_path)
                .unwrap_or_else(|| DEFAULT_FFMPEG.to_string()),
            grace_period,
            input_args: config.input_args,
            output_args: config.output_args,
            loop_playlist: args.loop_playlist || config.loop_playlist,
            loop_video: args.loop_video || config.loop_video,
        }
    }
}
