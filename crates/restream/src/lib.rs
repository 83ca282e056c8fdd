pub mod classify;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod playlist;
pub mod shutdown;
pub mod transcoder;

pub use classify::{ClassifyFlags, ClassifyReason, InputKind, classify};
pub use dispatcher::{DEFAULT_GRACE_PERIOD, DispatchState, Dispatcher, EndReason, RunSummary};
pub use error::RelayError;
pub use job::StreamJob;
pub use playlist::{Playlist, PlaylistEntry};
pub use shutdown::ShutdownCoordinator;
pub use transcoder::{
    DEFAULT_FFMPEG, FfmpegLauncher, Launcher, OutputLine, OutputStream, TranscoderConfig,
};
