use restream_engine::RelayError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to read config file `{}`: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file `{}`: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Process exit code for this error.
    ///
    /// | code | meaning |
    /// |------|---------|
    /// | 1 | configuration or other error |
    /// | 3 | playlist unreadable |
    /// | 4 | empty playlist |
    /// | 5 | ffmpeg not found or not startable |
    /// | 6 | single video failed |
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Relay(err) => match err {
                RelayError::PlaylistIo { .. } => 3,
                RelayError::EmptyPlaylist { .. } => 4,
                RelayError::ExecutableNotFound { .. } | RelayError::Spawn { .. } => 5,
                RelayError::SubprocessFailure { .. } | RelayError::SourceNotFound { .. } => 6,
                RelayError::InvalidJob { .. } => 1,
            },
            AppError::ConfigRead { .. }
            | AppError::ConfigParse { .. }
            | AppError::Logging(_)
            | AppError::Io(_) => 1,
        }
    }
}
