//! Decide whether an input argument names a playlist or a single stream source.

use std::fmt;
use std::path::Path;

use crate::playlist::is_remote_location;

/// Extensions parsed as M3U playlists.
pub const PLAYLIST_EXTENSIONS: &[&str] = &["m3u", "m3u8"];

/// Extensions recognised as single video files.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "flv", "wmv", "webm", "m4v", "ts", "m2ts",
];

/// How the input will be streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// A local M3U/M3U8 file whose entries are streamed in order.
    Playlist,
    /// One source handed to the transcoder as-is.
    SingleItem,
}

/// Flags that influence classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyFlags {
    pub single_file: bool,
}

/// Why an input received its [`InputKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassifyReason {
    /// `--single-file` was given.
    Forced,
    /// The input has a URL scheme; fetching it is the transcoder's job, even
    /// for remote `.m3u8` playlists.
    RemoteUrl,
    /// Local path with a playlist extension.
    PlaylistExtension,
    /// Local path with a known video extension.
    VideoExtension,
    /// Nothing matched. Unrecognised inputs are handed to the transcoder as a
    /// single source.
    Fallback,
}

impl ClassifyReason {
    pub fn kind(self) -> InputKind {
        match self {
            Self::PlaylistExtension => InputKind::Playlist,
            Self::Forced | Self::RemoteUrl | Self::VideoExtension | Self::Fallback => {
                InputKind::SingleItem
            }
        }
    }
}

impl fmt::Display for ClassifyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Forced => "forced single file",
            Self::RemoteUrl => "remote URL",
            Self::PlaylistExtension => "playlist extension",
            Self::VideoExtension => "video extension",
            Self::Fallback => "unrecognised input, trying as a single source",
        };
        f.write_str(text)
    }
}

/// Classify `input`. Pure: no filesystem or network access.
pub fn classify(input: &str, flags: ClassifyFlags) -> InputKind {
    explain(input, flags).kind()
}

/// Like [`classify`], but returns the matching rule.
pub fn explain(input: &str, flags: ClassifyFlags) -> ClassifyReason {
    if flags.single_file {
        return ClassifyReason::Forced;
    }
    if is_remote_location(input) {
        return ClassifyReason::RemoteUrl;
    }

    match extension(input) {
        Some(ext) if PLAYLIST_EXTENSIONS.contains(&ext.as_str()) => {
            ClassifyReason::PlaylistExtension
        }
        Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => ClassifyReason::VideoExtension,
        _ => ClassifyReason::Fallback,
    }
}

fn extension(input: &str) -> Option<String> {
    Path::new(input)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}
