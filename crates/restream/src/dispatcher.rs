//! Sequential dispatch of a [`StreamJob`] to the transcoder.
//!
//! One transcoder runs at a time. While it runs, the dispatcher races three
//! sources: the cancellation token, the next output line and process exit.
//! Cancellation is always checked first.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{RelayError, describe_exit};
use crate::job::StreamJob;
use crate::playlist::PlaylistEntry;
use crate::transcoder::progress::{format_media_time, parse_progress};
use crate::transcoder::{
    Launcher, OutputLine, SpawnedTranscoder, StreamProgress, TranscoderProcess,
};

/// How long a transcoder may take to exit after a termination request
/// before it is killed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Dispatcher lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchState {
    Idle,
    Invoking,
    Streaming,
    ItemDone,
    Finished,
    Aborted,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Invoking => "invoking",
            Self::Streaming => "streaming",
            Self::ItemDone => "item-done",
            Self::Finished => "finished",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndReason {
    /// Every item was dispatched and no loop was requested.
    Exhausted,
    /// Stopped on request.
    Cancelled,
    /// The only item of a single-item job failed, or a looping playlist had
    /// nothing playable.
    Failed,
    /// The transcoder could not be started at all.
    Fatal,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exhausted => "playlist finished",
            Self::Cancelled => "stopped by user",
            Self::Failed => "failed",
            Self::Fatal => "aborted by error",
        })
    }
}

/// Outcome of a whole run.
#[derive(Debug)]
pub struct RunSummary {
    /// Items dispatched, counting replays and skipped missing files.
    pub attempts: usize,
    /// Attempts that exited non-zero, died, or had no source file.
    pub failures: usize,
    pub end: EndReason,
    /// Index of the last item dispatched.
    pub last_item: Option<usize>,
    pub last_exit_code: Option<i32>,
    pub final_state: DispatchState,
    /// Media time reported by the transcoder, summed over attempts.
    pub media_time_secs: f64,
    last_label: Option<String>,
    last_missing: Option<String>,
    fatal: Option<RelayError>,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            attempts: 0,
            failures: 0,
            end: EndReason::Exhausted,
            last_item: None,
            last_exit_code: None,
            final_state: DispatchState::Idle,
            media_time_secs: 0.0,
            last_label: None,
            last_missing: None,
            fatal: None,
        }
    }

    pub fn was_cancelled(&self) -> bool {
        self.end == EndReason::Cancelled
    }

    /// Label of the last item dispatched.
    pub fn last_label(&self) -> Option<&str> {
        self.last_label.as_deref()
    }

    /// Error that stopped the run, if any.
    pub fn fatal_error(&self) -> Option<&RelayError> {
        self.fatal.as_ref()
    }

    /// Turn a failed run into the error describing its last attempt.
    pub fn into_result(mut self) -> Result<Self, RelayError> {
        if let Some(err) = self.fatal.take() {
            return Err(err);
        }
        if let (EndReason::Failed, Some(location)) = (self.end, &self.last_missing) {
            return Err(RelayError::SourceNotFound {
                location: location.clone(),
            });
        }
        match self.end {
            EndReason::Failed => Err(RelayError::SubprocessFailure {
                item: self.last_label.unwrap_or_default(),
                code: self.last_exit_code,
            }),
            EndReason::Exhausted | EndReason::Cancelled | EndReason::Fatal => Ok(self),
        }
    }

    fn record(&mut self, index: usize, entry: &PlaylistEntry, outcome: &ItemOutcome) {
        self.attempts += 1;
        self.last_item = Some(index);
        self.last_label = Some(entry.label().to_string());
        self.last_missing = None;

        match outcome {
            ItemOutcome::Exited { code, progress } => {
                self.last_exit_code = *code;
                if *code != Some(0) {
                    self.failures += 1;
                }
                self.add_progress(progress);
            }
            ItemOutcome::Missing => {
                self.last_exit_code = None;
                self.last_missing = Some(entry.location.clone());
                self.failures += 1;
            }
            ItemOutcome::Cancelled { code, progress } => {
                self.last_exit_code = *code;
                self.add_progress(progress);
            }
        }
    }

    fn add_progress(&mut self, progress: &Option<StreamProgress>) {
        if let Some(progress) = progress {
            self.media_time_secs += progress.media_time_secs;
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Streamed {} item(s), {} failed, {} of media; {}",
            self.attempts,
            self.failures,
            format_media_time(self.media_time_secs),
            self.end
        )
    }
}

enum ItemOutcome {
    Exited {
        code: Option<i32>,
        progress: Option<StreamProgress>,
    },
    /// Local file did not exist; nothing was spawned.
    Missing,
    Cancelled {
        code: Option<i32>,
        progress: Option<StreamProgress>,
    },
}

impl ItemOutcome {
    fn is_clean(&self) -> bool {
        matches!(self, Self::Exited { code: Some(0), .. })
    }

    fn describe(&self) -> String {
        match self {
            Self::Exited { code, .. } | Self::Cancelled { code, .. } => describe_exit(*code),
            Self::Missing => "file not found".to_string(),
        }
    }
}

/// How the dispatcher arrived at the current item. Only affects logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Start,
    Advance,
    LoopVideo,
    PlaylistRestart,
}

/// Runs a [`StreamJob`] item by item through a [`Launcher`].
pub struct Dispatcher<L> {
    launcher: L,
    grace_period: Duration,
}

impl<L: Launcher> Dispatcher<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Time allowed between the termination request and a forced kill.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Stream every item of `job` until the list is exhausted, the run fails
    /// or `cancel` fires.
    ///
    /// Output lines are handed to `on_output` in the order the transcoder
    /// wrote them. A transcoder that cannot be started ends the run with
    /// [`EndReason::Fatal`]; the error is kept in the summary and surfaced by
    /// [`RunSummary::into_result`].
    pub async fn run<F>(
        &self,
        job: &StreamJob,
        mut on_output: F,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, RelayError>
    where
        F: FnMut(&OutputLine),
    {
        let items = job.items();
        let total = items.len();
        let mut summary = RunSummary::new();
        let mut state = DispatchState::Idle;
        let mut cursor = 0usize;
        let mut entry_kind = Entry::Start;
        let mut spawned_this_pass = false;

        info!("Streaming {} item(s) to {}", total, job.destination());

        let end = loop {
            if cancel.is_cancelled() {
                info!("Stop requested before item {}/{}", cursor + 1, total);
                break EndReason::Cancelled;
            }

            let entry = &items[cursor];
            transition(&mut state, DispatchState::Invoking);
            match entry_kind {
                Entry::Start | Entry::Advance => {
                    info!("[{}/{}] Streaming: {}", cursor + 1, total, entry.label())
                }
                Entry::LoopVideo => {
                    info!("[{}/{}] Looping video: {}", cursor + 1, total, entry.label())
                }
                Entry::PlaylistRestart => {
                    info!("Restarting playlist");
                    info!("[{}/{}] Streaming: {}", cursor + 1, total, entry.label())
                }
            }
            debug!("Source: {}", entry.location);

            let outcome = if entry.is_local_file() && !Path::new(&entry.location).exists() {
                warn!("Video file not found: {}", entry.location);
                ItemOutcome::Missing
            } else {
                let spawned = match self.launcher.launch(entry, job.destination()) {
                    Ok(spawned) => spawned,
                    Err(e) => {
                        error!("Cannot start transcoder for {}: {}", entry.label(), e);
                        summary.fatal = Some(e);
                        break EndReason::Fatal;
                    }
                };
                spawned_this_pass = true;
                transition(&mut state, DispatchState::Streaming);
                self.stream_item(spawned, &mut on_output, cancel).await
            };
            summary.record(cursor, entry, &outcome);

            if matches!(outcome, ItemOutcome::Cancelled { .. }) {
                break EndReason::Cancelled;
            }
            transition(&mut state, DispatchState::ItemDone);

            if outcome.is_clean() && job.loop_video() {
                entry_kind = Entry::LoopVideo;
                continue;
            }

            if !outcome.is_clean() {
                warn!("Failed to stream {}: {}", entry.label(), outcome.describe());
                if job.is_single_item() && !job.loop_playlist() {
                    break EndReason::Failed;
                }
            }

            cursor += 1;
            if cursor < total {
                entry_kind = Entry::Advance;
                continue;
            }

            if !job.loop_playlist() {
                info!("Playlist finished streaming");
                break EndReason::Exhausted;
            }
            if !spawned_this_pass {
                error!("No playable item in the playlist, not restarting");
                break EndReason::Failed;
            }

            cursor = 0;
            spawned_this_pass = false;
            entry_kind = Entry::PlaylistRestart;
        };

        let final_state = match end {
            EndReason::Cancelled => DispatchState::Aborted,
            EndReason::Exhausted | EndReason::Failed | EndReason::Fatal => {
                DispatchState::Finished
            }
        };
        transition(&mut state, final_state);

        summary.end = end;
        summary.final_state = state;
        Ok(summary)
    }

    async fn stream_item<F>(
        &self,
        spawned: SpawnedTranscoder,
        on_output: &mut F,
        cancel: &CancellationToken,
    ) -> ItemOutcome
    where
        F: FnMut(&OutputLine),
    {
        let SpawnedTranscoder {
            mut process,
            mut output,
        } = spawned;
        let mut progress = None;
        let mut output_open = true;

        let status = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let code = self.stop_process(process.as_mut()).await;
                    self.drain_output(&mut output, on_output, &mut progress).await;
                    debug!("Transcoder stopped after cancellation ({})", describe_exit(code));
                    return ItemOutcome::Cancelled { code, progress };
                }
                line = output.recv(), if output_open => match line {
                    Some(line) => handle_line(&line, on_output, &mut progress),
                    None => output_open = false,
                },
                status = process.wait() => break status,
            }
        };

        self.drain_output(&mut output, on_output, &mut progress).await;

        let code = match status {
            Ok(code) => code,
            Err(e) => {
                error!("Error waiting for transcoder: {}", e);
                Some(-1)
            }
        };
        if code != Some(0) {
            warn!("Transcoder exited with {}", describe_exit(code));
        }

        ItemOutcome::Exited { code, progress }
    }

    /// Terminate, wait up to the grace period, then kill.
    ///
    /// Sends exactly one termination request.
    async fn stop_process(&self, process: &mut dyn TranscoderProcess) -> Option<i32> {
        info!("Stopping transcoder...");
        if let Err(e) = process.terminate() {
            warn!("Failed to request transcoder termination: {}", e);
        }

        let waited = tokio::time::timeout(self.grace_period, process.wait()).await;
        match waited {
            Ok(Ok(code)) => code,
            Ok(Err(e)) => {
                warn!("Error waiting for transcoder to stop: {}", e);
                force_kill(process).await
            }
            Err(_) => {
                warn!(
                    "Transcoder did not exit within {:?}, killing it",
                    self.grace_period
                );
                force_kill(process).await
            }
        }
    }

    /// Deliver output still buffered after exit.
    async fn drain_output<F>(
        &self,
        output: &mut mpsc::Receiver<OutputLine>,
        on_output: &mut F,
        progress: &mut Option<StreamProgress>,
    ) where
        F: FnMut(&OutputLine),
    {
        let drain = async {
            while let Some(line) = output.recv().await {
                handle_line(&line, on_output, progress);
            }
        };
        if tokio::time::timeout(self.grace_period, drain).await.is_err() {
            debug!("Transcoder output still open after exit, no longer reading it");
        }
    }
}

async fn force_kill(process: &mut dyn TranscoderProcess) -> Option<i32> {
    if let Err(e) = process.kill().await {
        error!("Failed to kill transcoder: {}", e);
    }
    None
}

fn handle_line<F>(line: &OutputLine, on_output: &mut F, progress: &mut Option<StreamProgress>)
where
    F: FnMut(&OutputLine),
{
    if let Some(update) = parse_progress(&line.text) {
        trace!(
            time = update.media_time_secs,
            speed = ?update.speed,
            "Transcoder progress"
        );
        *progress = Some(update);
    }
    on_output(line);
}

fn transition(state: &mut DispatchState, next: DispatchState) {
    debug!("Dispatcher {} -> {}", state, next);
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ShutdownCoordinator;
    use crate::transcoder::OutputStream;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    /// What a fake transcoder does once launched.
    #[derive(Clone, Copy, Default)]
    enum Behaviour {
        /// Exit at once with the scripted code.
        #[default]
        Exit,
        /// Run until terminated.
        Hang,
        /// Run until killed.
        IgnoreTerminate,
    }

    #[derive(Default)]
    struct Counters {
        terminations: AtomicUsize,
        kills: AtomicUsize,
    }

    #[derive(Default)]
    struct FakeLauncher {
        launches: Mutex<Vec<String>>,
        exit_codes: HashMap<String, i32>,
        behaviour: Behaviour,
        cancel_after: Option<(usize, CancellationToken)>,
        missing_from: Option<usize>,
        lines: Vec<String>,
        counters: Arc<Counters>,
    }

    impl FakeLauncher {
        fn exiting_with(mut self, location: &str, code: i32) -> Self {
            self.exit_codes.insert(location.to_string(), code);
            self
        }

        fn behaving(mut self, behaviour: Behaviour) -> Self {
            self.behaviour = behaviour;
            self
        }

        fn cancelling_after(mut self, launches: usize, token: &CancellationToken) -> Self {
            self.cancel_after = Some((launches, token.clone()));
            self
        }

        /// Report the executable as missing from the `launch`-th launch on.
        fn missing_from(mut self, launch: usize) -> Self {
            self.missing_from = Some(launch);
            self
        }

        fn printing(mut self, lines: &[&str]) -> Self {
            self.lines = lines.iter().map(|l| l.to_string()).collect();
            self
        }

        fn launches(&self) -> Vec<String> {
            self.launches.lock().unwrap().clone()
        }
    }

    impl Launcher for FakeLauncher {
        fn launch(
            &self,
            entry: &PlaylistEntry,
            _destination: &str,
        ) -> Result<SpawnedTranscoder, RelayError> {
            let count = {
                let mut launches = self.launches.lock().unwrap();
                if self.missing_from.is_some_and(|from| launches.len() + 1 >= from) {
                    return Err(RelayError::spawn(
                        "ffmpeg",
                        io::Error::from(io::ErrorKind::NotFound),
                    ));
                }
                launches.push(entry.location.clone());
                launches.len()
            };
            if let Some((after, token)) = &self.cancel_after {
                if count >= *after {
                    token.cancel();
                }
            }

            let (tx, rx) = mpsc::channel(64);
            for text in &self.lines {
                tx.try_send(OutputLine {
                    stream: OutputStream::Stderr,
                    text: text.clone(),
                })
                .unwrap();
            }

            Ok(SpawnedTranscoder {
                process: Box::new(FakeProcess {
                    code: self.exit_codes.get(&entry.location).copied().unwrap_or(0),
                    behaviour: self.behaviour,
                    stop: Arc::new(Notify::new()),
                    killed: false,
                    counters: self.counters.clone(),
                }),
                output: rx,
            })
        }
    }

    struct FakeProcess {
        code: i32,
        behaviour: Behaviour,
        stop: Arc<Notify>,
        killed: bool,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl TranscoderProcess for FakeProcess {
        async fn wait(&mut self) -> io::Result<Option<i32>> {
            match self.behaviour {
                Behaviour::Exit => Ok(Some(self.code)),
                Behaviour::Hang | Behaviour::IgnoreTerminate => {
                    self.stop.notified().await;
                    Ok(if self.killed { None } else { Some(255) })
                }
            }
        }

        fn terminate(&mut self) -> io::Result<()> {
            self.counters.terminations.fetch_add(1, Ordering::SeqCst);
            if !matches!(self.behaviour, Behaviour::IgnoreTerminate) {
                self.stop.notify_one();
            }
            Ok(())
        }

        async fn kill(&mut self) -> io::Result<()> {
            self.counters.kills.fetch_add(1, Ordering::SeqCst);
            self.killed = true;
            self.stop.notify_one();
            Ok(())
        }
    }

    fn job(locations: &[&str]) -> StreamJob {
        let items = locations.iter().map(|l| PlaylistEntry::new(*l)).collect();
        StreamJob::new(items, "rtmp://live.example/app/key", "ffmpeg").unwrap()
    }

    #[tokio::test]
    async fn failed_item_does_not_stop_playlist() {
        let launcher = FakeLauncher::default().exiting_with("http://src/b.mp4", 1);
        let dispatcher = Dispatcher::new(launcher);
        let token = CancellationToken::new();

        let summary = dispatcher
            .run(
                &job(&["http://src/a.mp4", "http://src/b.mp4", "http://src/c.mp4"]),
                |_| {},
                &token,
            )
            .await
            .unwrap();

        assert_eq!(
            dispatcher.launcher().launches(),
            vec!["http://src/a.mp4", "http://src/b.mp4", "http://src/c.mp4"]
        );
        assert_eq!(summary.attempts, 3);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.end, EndReason::Exhausted);
        assert_eq!(summary.final_state, DispatchState::Finished);
        assert_eq!(summary.last_item, Some(2));
        assert_eq!(summary.last_exit_code, Some(0));
        assert!(summary.into_result().is_ok());
    }

    #[tokio::test]
    async fn single_item_failure_fails_the_run() {
        let launcher = FakeLauncher::default().exiting_with("http://src/a.mp4", 1);
        let dispatcher = Dispatcher::new(launcher);
        let token = CancellationToken::new();

        let summary = dispatcher
            .run(&job(&["http://src/a.mp4"]), |_| {}, &token)
            .await
            .unwrap();

        assert_eq!(summary.end, EndReason::Failed);
        assert_eq!(summary.failures, 1);
        assert!(matches!(
            summary.into_result(),
            Err(RelayError::SubprocessFailure { code: Some(1), .. })
        ));
    }

    #[tokio::test]
    async fn loop_playlist_alternates_until_cancelled() {
        let token = CancellationToken::new();
        let launcher = FakeLauncher::default().cancelling_after(6, &token);
        let dispatcher = Dispatcher::new(launcher);
        let job = job(&["http://src/a", "http://src/b"]).with_loop_playlist(true);

        let summary = dispatcher.run(&job, |_| {}, &token).await.unwrap();

        assert_eq!(
            dispatcher.launcher().launches(),
            vec![
                "http://src/a",
                "http://src/b",
                "http://src/a",
                "http://src/b",
                "http://src/a",
                "http://src/b"
            ]
        );
        assert_eq!(summary.end, EndReason::Cancelled);
        assert_eq!(summary.final_state, DispatchState::Aborted);
    }

    #[tokio::test]
    async fn loop_video_replays_single_item_until_cancelled() {
        let token = CancellationToken::new();
        let launcher = FakeLauncher::default().cancelling_after(5, &token);
        let dispatcher = Dispatcher::new(launcher);
        let job = job(&["http://src/a"]).with_loop_video(true);

        let summary = dispatcher.run(&job, |_| {}, &token).await.unwrap();

        assert_eq!(dispatcher.launcher().launches(), vec!["http://src/a"; 5]);
        assert_eq!(summary.attempts, 5);
        assert_eq!(summary.failures, 0);
        assert!(summary.was_cancelled());
        assert_eq!(summary.final_state, DispatchState::Aborted);
    }

    #[tokio::test]
    async fn loop_video_advances_past_failed_item() {
        let token = CancellationToken::new();
        let launcher = FakeLauncher::default()
            .exiting_with("http://src/a", 1)
            .cancelling_after(4, &token);
        let dispatcher = Dispatcher::new(launcher);
        let job = job(&["http://src/a", "http://src/b"]).with_loop_video(true);

        let summary = dispatcher.run(&job, |_| {}, &token).await.unwrap();

        assert_eq!(
            dispatcher.launcher().launches(),
            vec!["http://src/a", "http://src/b", "http://src/b", "http://src/b"]
        );
        assert_eq!(summary.failures, 1);
        assert!(summary.was_cancelled());
    }

    #[tokio::test]
    async fn single_entry_loop_playlist_replays_it() {
        let token = CancellationToken::new();
        let launcher = FakeLauncher::default().cancelling_after(3, &token);
        let dispatcher = Dispatcher::new(launcher);
        let job = job(&["http://src/only"]).with_loop_playlist(true);

        let summary = dispatcher.run(&job, |_| {}, &token).await.unwrap();

        assert_eq!(dispatcher.launcher().launches(), vec!["http://src/only"; 3]);
        assert!(summary.was_cancelled());
    }

    #[tokio::test]
    async fn cancellation_sends_one_termination_request() {
        let token = CancellationToken::new();
        let launcher = FakeLauncher::default()
            .behaving(Behaviour::Hang)
            .cancelling_after(1, &token);
        let counters = launcher.counters.clone();
        let dispatcher = Dispatcher::new(launcher);

        let summary = dispatcher
            .run(&job(&["http://src/a", "http://src/b"]), |_| {}, &token)
            .await
            .unwrap();

        assert_eq!(counters.terminations.load(Ordering::SeqCst), 1);
        assert_eq!(counters.kills.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.launcher().launches(), vec!["http://src/a"]);
        assert_eq!(summary.end, EndReason::Cancelled);
        assert_eq!(summary.last_exit_code, Some(255));
        assert_eq!(summary.final_state, DispatchState::Aborted);
    }

    #[tokio::test]
    async fn repeated_shutdown_requests_do_not_terminate_twice() {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let token = coordinator.token();
        let launcher = FakeLauncher::default().behaving(Behaviour::IgnoreTerminate);
        let counters = launcher.counters.clone();
        let dispatcher =
            Dispatcher::new(launcher).with_grace_period(Duration::from_millis(200));

        let interrupter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                assert!(coordinator.request_shutdown());
                tokio::time::sleep(Duration::from_millis(20)).await;
                assert!(!coordinator.request_shutdown());
            })
        };

        let summary = dispatcher
            .run(&job(&["http://src/a"]), |_| {}, &token)
            .await
            .unwrap();
        interrupter.await.unwrap();

        assert_eq!(counters.terminations.load(Ordering::SeqCst), 1);
        assert_eq!(counters.kills.load(Ordering::SeqCst), 1);
        assert_eq!(summary.last_exit_code, None);
        assert_eq!(summary.end, EndReason::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_before_start_spawns_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let dispatcher = Dispatcher::new(FakeLauncher::default());

        let summary = dispatcher
            .run(&job(&["http://src/a"]), |_| {}, &token)
            .await
            .unwrap();

        assert!(dispatcher.launcher().launches().is_empty());
        assert_eq!(summary.attempts, 0);
        assert_eq!(summary.final_state, DispatchState::Aborted);
    }

    #[tokio::test]
    async fn output_lines_arrive_in_order_and_feed_progress() {
        let launcher = FakeLauncher::default().printing(&[
            "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'a.mp4':",
            "frame=   50 fps= 25 q=-1.0 size=     256kB time=00:00:02.00 bitrate=1048.6kbits/s speed=1.00x",
            "frame=  100 fps= 25 q=-1.0 size=     512kB time=00:00:04.00 bitrate=1048.6kbits/s speed=1.00x",
        ]);
        let dispatcher = Dispatcher::new(launcher);
        let token = CancellationToken::new();

        let mut seen = Vec::new();
        let summary = dispatcher
            .run(
                &job(&["http://src/a.mp4"]),
                |line| seen.push(line.text.clone()),
                &token,
            )
            .await
            .unwrap();

        assert_eq!(seen.len(), 3);
        assert!(seen[0].starts_with("Input #0"));
        assert!(seen[2].contains("time=00:00:04.00"));
        assert_eq!(summary.media_time_secs, 4.0);
    }

    #[tokio::test]
    async fn missing_local_files_are_skipped_as_failures() {
        let dispatcher = Dispatcher::new(FakeLauncher::default());
        let token = CancellationToken::new();

        let summary = dispatcher
            .run(
                &job(&["/definitely/not/here/a.mp4", "http://src/b.mp4"]),
                |_| {},
                &token,
            )
            .await
            .unwrap();

        assert_eq!(dispatcher.launcher().launches(), vec!["http://src/b.mp4"]);
        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.end, EndReason::Exhausted);
    }

    #[tokio::test]
    async fn looping_playlist_with_nothing_playable_gives_up() {
        let dispatcher = Dispatcher::new(FakeLauncher::default());
        let token = CancellationToken::new();
        let job = job(&["/missing/a.mp4", "/missing/b.mp4"]).with_loop_playlist(true);

        let summary = dispatcher.run(&job, |_| {}, &token).await.unwrap();

        assert!(dispatcher.launcher().launches().is_empty());
        assert_eq!(summary.end, EndReason::Failed);
        assert_eq!(summary.failures, 2);
        assert!(matches!(
            summary.into_result(),
            Err(RelayError::SourceNotFound { ref location }) if location == "/missing/b.mp4"
        ));
    }

    #[tokio::test]
    async fn missing_executable_aborts_the_run() {
        let dispatcher = Dispatcher::new(FakeLauncher::default().missing_from(1));
        let token = CancellationToken::new();

        let summary = dispatcher
            .run(&job(&["http://src/a", "http://src/b"]), |_| {}, &token)
            .await
            .unwrap();

        assert_eq!(summary.attempts, 0);
        assert_eq!(summary.end, EndReason::Fatal);
        assert!(matches!(
            summary.into_result(),
            Err(RelayError::ExecutableNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn launch_error_mid_playlist_keeps_summary() {
        let dispatcher = Dispatcher::new(
            FakeLauncher::default()
                .exiting_with("http://src/b", 1)
                .missing_from(3),
        );
        let token = CancellationToken::new();

        let summary = dispatcher
            .run(
                &job(&["http://src/a", "http://src/b", "http://src/c"]),
                |_| {},
                &token,
            )
            .await
            .unwrap();

        assert_eq!(
            dispatcher.launcher().launches(),
            vec!["http://src/a", "http://src/b"]
        );
        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.end, EndReason::Fatal);
        assert_eq!(summary.final_state, DispatchState::Finished);
        assert_eq!(summary.last_item, Some(1));
        assert!(matches!(
            summary.fatal_error(),
            Some(RelayError::ExecutableNotFound { .. })
        ));
        assert_eq!(
            summary.to_string(),
            "Streamed 2 item(s), 1 failed, 00:00:00 of media; aborted by error"
        );
        assert!(matches!(
            summary.into_result(),
            Err(RelayError::ExecutableNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn protocol_locations_skip_file_check() {
        let dispatcher = Dispatcher::new(FakeLauncher::default());
        let token = CancellationToken::new();

        let summary = dispatcher
            .run(&job(&["pipe:0", "concat:a.ts|b.ts"]), |_| {}, &token)
            .await
            .unwrap();

        assert_eq!(
            dispatcher.launcher().launches(),
            vec!["pipe:0", "concat:a.ts|b.ts"]
        );
        assert_eq!(summary.failures, 0);
        assert!(summary.into_result().is_ok());
    }

    #[test]
    fn summary_line_mentions_counts_and_reason() {
        let mut summary = RunSummary::new();
        summary.attempts = 3;
        summary.failures = 1;
        summary.media_time_secs = 125.0;

        assert_eq!(
            summary.to_string(),
            "Streamed 3 item(s), 1 failed, 00:02:05 of media; playlist finished"
        );
    }
}
