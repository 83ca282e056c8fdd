use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "restream",
    version,
    about = "Relay an M3U playlist, a video file or a stream URL to an RTMP endpoint",
    long_about = "Relay an M3U playlist, a video file or a stream URL to an RTMP endpoint.\n\n\
                  Every item is handed to ffmpeg in passthrough mode (no re-encoding), read at \
                  native frame rate and sent as FLV to the destination."
)]
pub struct Args {
    /// Playlist (.m3u/.m3u8), video file or stream URL
    pub input: String,

    /// Destination RTMP URL, including the stream key
    pub rtmp_url: String,

    /// ffmpeg executable to run [default: ffmpeg from PATH]
    #[arg(long, env = "RESTREAM_FFMPEG", value_name = "PATH")]
    pub ffmpeg: Option<String>,

    /// Treat the input as a single video even if it looks like a playlist
    #[arg(long)]
    pub single_file: bool,

    /// Restart the playlist after the last item (no effect on a single video)
    #[arg(long)]
    pub loop_playlist: bool,

    /// Replay each video until stopped
    #[arg(long)]
    pub loop_video: bool,

    /// Seconds ffmpeg gets to exit after a stop request before it is killed
    #[arg(long, value_name = "SECS")]
    pub grace_period: Option<u64>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_positionals_and_flags() {
        let args = Args::try_parse_from([
            "restream",
            "show.m3u8",
            "rtmp://live.example/app/key",
            "--loop-playlist",
            "--grace-period",
            "10",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.input, "show.m3u8");
        assert_eq!(args.rtmp_url, "rtmp://live.example/app/key");
        assert!(args.loop_playlist);
        assert!(!args.loop_video);
        assert_eq!(args.grace_period, Some(10));
        assert!(args.verbose);
    }

    #[test]
    fn missing_destination_is_a_usage_error() {
        let err = Args::try_parse_from(["restream", "show.m3u8"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Args::try_parse_from(["restream", "a.mp4", "rtmp://x/y", "-v", "-q"]).is_err());
    }
}
