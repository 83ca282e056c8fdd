//! ffmpeg-backed launcher.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use process_utils::{request_termination, tokio_command};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::record_reader::spawn_forwarder;
use super::{Launcher, OutputStream, SpawnedTranscoder, TranscoderProcess};
use crate::error::RelayError;
use crate::playlist::PlaylistEntry;

/// Executable looked up on `PATH` when none is configured.
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Output records buffered between the pipe readers and the dispatcher.
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// How ffmpeg is invoked.
#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    /// Path or name of the ffmpeg executable.
    pub binary_path: String,
    /// Extra arguments placed before `-i`.
    pub input_args: Vec<String>,
    /// Extra arguments placed after `-c copy`, before the muxer options.
    pub output_args: Vec<String>,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            binary_path: DEFAULT_FFMPEG.to_string(),
            input_args: Vec::new(),
            output_args: Vec::new(),
        }
    }
}

impl TranscoderConfig {
    pub fn new(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            ..Self::default()
        }
    }

    pub fn with_input_args(mut self, args: Vec<String>) -> Self {
        self.input_args = args;
        self
    }

    pub fn with_output_args(mut self, args: Vec<String>) -> Self {
        self.output_args = args;
        self
    }
}

/// Spawns ffmpeg in passthrough mode: native-rate read, stream copy, FLV out.
#[derive(Debug, Clone, Default)]
pub struct FfmpegLauncher {
    config: TranscoderConfig,
}

impl FfmpegLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TranscoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Build the argument list for one item.
    pub fn build_args(&self, location: &str, destination: &str) -> Vec<String> {
        let mut args = vec!["-hide_banner".to_string()];

        args.extend(self.config.input_args.iter().cloned());

        // Read at native frame rate so the destination receives a live pace
        args.extend(["-re".to_string(), "-i".to_string(), location.to_string()]);

        // Copy every stream without re-encoding
        args.extend(["-c".to_string(), "copy".to_string()]);

        args.extend(self.config.output_args.iter().cloned());

        // RTMP requires FLV; the duration/filesize header cannot be patched on a live socket
        args.extend([
            "-f".to_string(),
            "flv".to_string(),
            "-flvflags".to_string(),
            "no_duration_filesize".to_string(),
            destination.to_string(),
        ]);

        args
    }

    /// First line of `ffmpeg -version`, if the executable runs at all.
    pub async fn probe_version(&self) -> Option<String> {
        let output = tokio_command(&self.config.binary_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;

        String::from_utf8(output.stdout)
            .ok()
            .and_then(|s| s.lines().next().map(|l| l.trim().to_string()))
            .filter(|l| !l.is_empty())
    }
}

impl Launcher for FfmpegLauncher {
    fn launch(
        &self,
        entry: &PlaylistEntry,
        destination: &str,
    ) -> Result<SpawnedTranscoder, RelayError> {
        let args = self.build_args(&entry.location, destination);
        debug!("Spawning {} with args: {:?}", self.config.binary_path, args);

        let mut cmd = tokio_command(&self.config.binary_path);
        cmd.args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| RelayError::spawn(&self.config.binary_path, e))?;

        let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_forwarder(stdout, OutputStream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_forwarder(stderr, OutputStream::Stderr, tx));
        }

        Ok(SpawnedTranscoder {
            process: Box::new(FfmpegProcess { child, readers }),
            output: rx,
        })
    }
}

struct FfmpegProcess {
    child: Child,
    readers: Vec<JoinHandle<()>>,
}

#[async_trait]
impl TranscoderProcess for FfmpegProcess {
    async fn wait(&mut self) -> io::Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }

    fn terminate(&mut self) -> io::Result<()> {
        if !request_termination(&mut self.child)? {
            debug!("Transcoder already exited before termination request");
        }
        Ok(())
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.child.kill().await
    }
}

impl Drop for FfmpegProcess {
    fn drop(&mut self) {
        // A grandchild may still hold the pipes open
        for reader in &self.readers {
            reader.abort();
        }
    }
}
