//! The resolved execution plan for one run.

use crate::error::RelayError;
use crate::playlist::PlaylistEntry;

/// Items to stream, where to send them and how to loop.
///
/// Immutable once built. The playback cursor belongs to the dispatcher.
#[derive(Debug, Clone)]
pub struct StreamJob {
    items: Vec<PlaylistEntry>,
    destination: String,
    loop_playlist: bool,
    loop_video: bool,
    transcoder_path: String,
}

impl StreamJob {
    /// Create a job. `items` and `destination` must not be empty.
    pub fn new(
        items: Vec<PlaylistEntry>,
        destination: impl Into<String>,
        transcoder_path: impl Into<String>,
    ) -> Result<Self, RelayError> {
        let destination = destination.into();
        let transcoder_path = transcoder_path.into();

        if items.is_empty() {
            return Err(RelayError::invalid_job("nothing to stream"));
        }
        if let Some(entry) = items.iter().find(|e| e.location.trim().is_empty()) {
            return Err(RelayError::invalid_job(format!(
                "entry {:?} has an empty location",
                entry.display_name
            )));
        }
        if destination.trim().is_empty() {
            return Err(RelayError::invalid_job("destination URL is empty"));
        }
        if transcoder_path.trim().is_empty() {
            return Err(RelayError::invalid_job("transcoder path is empty"));
        }

        Ok(Self {
            items,
            destination,
            loop_playlist: false,
            loop_video: false,
            transcoder_path,
        })
    }

    /// Restart from the first item once the list is exhausted.
    pub fn with_loop_playlist(mut self, enabled: bool) -> Self {
        self.loop_playlist = enabled;
        self
    }

    /// Replay each item after a clean exit before advancing.
    pub fn with_loop_video(mut self, enabled: bool) -> Self {
        self.loop_video = enabled;
        self
    }

    pub fn items(&self) -> &[PlaylistEntry] {
        &self.items
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn loop_playlist(&self) -> bool {
        self.loop_playlist
    }

    pub fn loop_video(&self) -> bool {
        self.loop_video
    }

    pub fn transcoder_path(&self) -> &str {
        &self.transcoder_path
    }

    pub fn is_single_item(&self) -> bool {
        self.items.len() == 1
    }
}
