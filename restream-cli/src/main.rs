mod cli;
mod config;
mod error;
mod output;

use crate::{
    cli::Args,
    config::{AppConfig, Settings},
    error::{AppError, Result},
    output::OutputManager,
};
use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use restream_engine::{
    ClassifyFlags, Dispatcher, FfmpegLauncher, InputKind, PlaylistEntry, ShutdownCoordinator,
    StreamJob, TranscoderConfig, classify, playlist,
};
use std::{io::IsTerminal, path::Path, process};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const DEFAULT_LOG_FILTER: &str = "restream=info,restream_engine=info";

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let guard = match init_logging(args.verbose, args.quiet, args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            report_error(&e);
            process::exit(e.exit_code());
        }
    };

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Application error: {}", e);
            report_error(&e);
            e.exit_code()
        }
    };

    // Flush the file writer before exiting
    drop(guard);
    process::exit(code);
}

fn report_error(e: &AppError) {
    #[cfg(feature = "colored-output")]
    {
        eprintln!("{} {}", "Error:".red().bold(), e);
    }
    #[cfg(not(feature = "colored-output"))]
    {
        eprintln!("Error: {}", e);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = AppConfig::load(args.config.as_deref())?;
    let settings = Settings::resolve(&args, config);
    let output = OutputManager::new(std::io::stdout().is_terminal());

    let reason = classify::explain(
        &args.input,
        ClassifyFlags {
            single_file: args.single_file,
        },
    );
    debug!("Input {} is a {:?}: {}", args.input, reason.kind(), reason);

    let (items, loop_playlist) = match reason.kind() {
        InputKind::Playlist => {
            let playlist = playlist::parse(&args.input)?;
            output.print_playlist(&playlist);
            (playlist.into_entries(), settings.loop_playlist)
        }
        InputKind::SingleItem => {
            if settings.loop_playlist {
                warn!("Loop playlist has no effect on a single video, use --loop-video to repeat it");
            }
            (vec![PlaylistEntry::new(args.input.as_str())], false)
        }
    };

    let job = StreamJob::new(items, args.rtmp_url.as_str(), settings.ffmpeg_path.as_str())?
        .with_loop_playlist(loop_playlist)
        .with_loop_video(settings.loop_video);

    let launcher = FfmpegLauncher::with_config(
        TranscoderConfig::new(job.transcoder_path())
            .with_input_args(settings.input_args.clone())
            .with_output_args(settings.output_args.clone()),
    );
    match launcher.probe_version().await {
        Some(version) => info!("Using {}", version),
        None => debug!("Could not determine version of {}", job.transcoder_path()),
    }

    let dispatcher = Dispatcher::new(launcher).with_grace_period(settings.grace_period);
    let coordinator = ShutdownCoordinator::new();
    let token = coordinator.token();

    info!("Press Ctrl+C to stop streaming");
    let summary = coordinator
        .supervise(dispatcher.run(&job, |line| output.echo(line), &token))
        .await?;

    output.print_summary(&summary);
    summary.into_result()?;
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(verbose);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;

    Ok(guard)
}
