//! The external transcoder seam.
//!
//! The dispatcher only talks to a [`Launcher`]. [`FfmpegLauncher`] is the
//! real implementation; tests swap in their own.

mod ffmpeg;
pub mod progress;
mod record_reader;

use std::fmt;
use std::io;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::playlist::PlaylistEntry;

pub use ffmpeg::{DEFAULT_FFMPEG, FfmpegLauncher, TranscoderConfig};
pub use progress::StreamProgress;
pub use record_reader::RecordReader;

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        })
    }
}

/// One record of transcoder output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

/// Control over a running transcoder.
#[async_trait]
pub trait TranscoderProcess: Send {
    /// Wait for the process to exit. `None` means it was killed by a signal.
    ///
    /// Must be cancel-safe: the dispatcher polls it inside `select!`.
    async fn wait(&mut self) -> io::Result<Option<i32>>;

    /// Politely ask the process to stop. Does not wait.
    fn terminate(&mut self) -> io::Result<()>;

    /// Forcefully stop the process and reap it.
    async fn kill(&mut self) -> io::Result<()>;
}

/// A freshly spawned transcoder and the channel carrying its output.
pub struct SpawnedTranscoder {
    pub process: Box<dyn TranscoderProcess>,
    /// Closed once both output pipes reach end of stream.
    pub output: mpsc::Receiver<OutputLine>,
}

/// Starts one transcoder invocation per item.
pub trait Launcher: Send + Sync {
    /// Start relaying `entry` to `destination`.
    ///
    /// A missing executable must be reported as
    /// [`RelayError::ExecutableNotFound`].
    fn launch(
        &self,
        entry: &PlaylistEntry,
        destination: &str,
    ) -> Result<SpawnedTranscoder, RelayError>;
}
