//! Parsing of ffmpeg's periodic status line.
//!
//! `frame=  250 fps= 25 q=-1.0 size=    2048kB time=00:00:10.00 bitrate=1677.7kbits/s speed=1.00x`

/// Snapshot of how far the transcoder got with the current item.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamProgress {
    /// Media time sent so far, in seconds.
    pub media_time_secs: f64,
    /// Realtime multiplier; around 1.0 when reading with `-re`.
    pub speed: Option<f64>,
    pub bitrate_kbps: Option<f64>,
}

/// Parse `HH:MM:SS.ms` into seconds.
pub fn parse_time(time_str: &str) -> Option<f64> {
    let mut parts = time_str.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || hours < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Value of `key=` on the line, skipping the padding ffmpeg inserts after `=`.
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = line[start..].trim_start();
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some(&rest[..end])
}

pub fn parse_time_field(line: &str) -> Option<f64> {
    parse_time(field(line, "time=")?)
}

pub fn parse_speed(line: &str) -> Option<f64> {
    field(line, "speed=")?.strip_suffix('x')?.parse().ok()
}

pub fn parse_bitrate_kbps(line: &str) -> Option<f64> {
    field(line, "bitrate=")?
        .strip_suffix("kbits/s")?
        .parse()
        .ok()
}

/// Parse a status line. Other output yields `None`.
pub fn parse_progress(line: &str) -> Option<StreamProgress> {
    if !line.contains("time=") || !(line.contains("frame=") || line.contains("size=")) {
        return None;
    }

    Some(StreamProgress {
        media_time_secs: parse_time_field(line)?,
        speed: parse_speed(line),
        bitrate_kbps: parse_bitrate_kbps(line),
    })
}

/// Format seconds as `HH:MM:SS`.
pub fn format_media_time(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
