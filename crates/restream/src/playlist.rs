//! M3U/M3U8 playlist parsing.
//!
//! Only the simple "list of files" dialect is understood: an optional
//! `#EXTM3U` header, optional `#EXTINF:<duration>,<name>` metadata and one
//! location per line. Relative locations are resolved once, here, against the
//! directory holding the playlist.

use std::path::{Component, Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::error::RelayError;

const HEADER_TAG: &str = "#EXTM3U";
const EXTINF_TAG: &str = "#EXTINF:";

/// A single playable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    /// Absolute path, URL, or path given verbatim on the command line.
    pub location: String,
    /// Name taken from `#EXTINF`, if any.
    pub display_name: Option<String>,
}

impl PlaylistEntry {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Whether the location is a URL rather than a filesystem path.
    pub fn is_remote(&self) -> bool {
        is_remote_location(&self.location)
    }

    /// Whether the location names a file on disk, as opposed to a URL or an
    /// ffmpeg protocol such as `pipe:0` or `concat:a.ts|b.ts`.
    pub fn is_local_file(&self) -> bool {
        !self.is_remote() && !is_protocol_location(&self.location)
    }

    /// Label used in logs: the display name, else the file name, else the URL.
    pub fn label(&self) -> &str {
        if let Some(name) = self.display_name.as_deref() {
            return name;
        }
        if !self.is_local_file() {
            return &self.location;
        }
        Path::new(&self.location)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.location)
    }
}

/// Ordered, non-empty list of entries parsed from a playlist file.
#[derive(Debug, Clone)]
pub struct Playlist {
    source: PathBuf,
    entries: Vec<PlaylistEntry>,
}

impl Playlist {
    /// Absolute path of the playlist file.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<PlaylistEntry> {
        self.entries
    }
}

/// Read and parse the playlist at `path`.
///
/// Relative entries are resolved against the playlist's own directory,
/// whatever the current working directory is.
pub fn parse(path: impl AsRef<Path>) -> Result<Playlist, RelayError> {
    let path = path.as_ref();
    let source = std::path::absolute(path).map_err(|e| RelayError::playlist_io(path, e))?;

    let bytes = std::fs::read(&source).map_err(|e| RelayError::playlist_io(&source, e))?;
    let content = String::from_utf8_lossy(&bytes);

    let base_dir = source.parent().unwrap_or_else(|| Path::new("/"));
    let entries = parse_str(&content, base_dir);
    if entries.is_empty() {
        return Err(RelayError::EmptyPlaylist { path: source });
    }

    debug!("Parsed {} entries from {}", entries.len(), source.display());
    Ok(Playlist { source, entries })
}

/// Parse playlist text, resolving relative locations against `base_dir`.
pub fn parse_str(content: &str, base_dir: &Path) -> Vec<PlaylistEntry> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut entries = Vec::new();
    let mut pending_name: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(HEADER_TAG) {
            continue;
        }

        if let Some(info) = line.strip_prefix(EXTINF_TAG) {
            pending_name = parse_extinf_name(info);
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let location = resolve_location(line, base_dir);
        entries.push(PlaylistEntry {
            location,
            display_name: pending_name.take(),
        });
    }

    entries
}

/// Extract the title from the part of an `#EXTINF` line after the colon.
///
/// A missing comma or a blank title yields no name.
fn parse_extinf_name(info: &str) -> Option<String> {
    let (_, name) = info.split_once(',')?;
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn resolve_location(raw: &str, base_dir: &Path) -> String {
    if is_remote_location(raw) || is_protocol_location(raw) {
        return raw.to_string();
    }

    let path = Path::new(raw);
    if path.is_absolute() {
        return raw.to_string();
    }

    normalize_lexically(&base_dir.join(path))
        .to_string_lossy()
        .into_owned()
}

/// Whether `location` carries a URL scheme (`http://`, `rtmp://`, `udp://`...).
///
/// Requiring `://` keeps Windows drive paths such as `C:\video.mp4` local.
pub fn is_remote_location(location: &str) -> bool {
    location.contains("://") && Url::parse(location).is_ok()
}

/// Whether `location` is an ffmpeg protocol input without `://`, like
/// `pipe:0` or `concat:a.ts|b.ts`.
///
/// The prefix must be at least two characters so `C:\video.mp4` stays a path.
pub fn is_protocol_location(location: &str) -> bool {
    match location.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() >= 2
                && scheme
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        }
        None => false,
    }
}

/// Fold `.` and `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
