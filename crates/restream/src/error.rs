use std::path::PathBuf;

/// Errors raised while preparing or running a relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to read playlist `{}`: {source}", path.display())]
    PlaylistIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("playlist `{}` contains no entries", path.display())]
    EmptyPlaylist { path: PathBuf },

    #[error("transcoder executable `{path}` not found")]
    ExecutableNotFound { path: String },

    #[error("failed to spawn transcoder `{path}`: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("source `{location}` not found")]
    SourceNotFound { location: String },

    #[error("transcoder failed on `{item}` ({})", describe_exit(*code))]
    SubprocessFailure { item: String, code: Option<i32> },

    #[error("invalid job: {reason}")]
    InvalidJob { reason: String },
}

impl RelayError {
    pub fn playlist_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PlaylistIo {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_job(reason: impl Into<String>) -> Self {
        Self::InvalidJob {
            reason: reason.into(),
        }
    }

    /// Map a spawn failure, separating a missing executable from other causes.
    pub fn spawn(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::ExecutableNotFound { path }
        } else {
            Self::Spawn { path, source }
        }
    }
}

/// Human readable form of a child exit code.
pub fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}
