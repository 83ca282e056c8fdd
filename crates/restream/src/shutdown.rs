//! Turns process interrupts into a single cancellation of the run.

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the root cancellation token for a run.
///
/// The dispatcher only ever sees child tokens; it never learns whether the
/// stop came from a signal or from code.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    requested: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to pass to `Dispatcher::run`.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Request shutdown. Returns `true` only for the first request.
    pub fn request_shutdown(&self) -> bool {
        if self.requested.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_shutting_down(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Drive `run` to completion while listening for Ctrl+C and SIGTERM.
    ///
    /// The first interrupt cancels the token; later ones are logged and
    /// otherwise ignored. Returns whatever `run` returns, which for a
    /// dispatcher run is only after its transcoder has exited.
    pub async fn supervise<F>(&self, run: F) -> F::Output
    where
        F: Future,
    {
        let mut interrupts = match Interrupts::install() {
            Ok(interrupts) => Some(interrupts),
            Err(e) => {
                warn!("Failed to install signal handlers: {}", e);
                None
            }
        };

        tokio::pin!(run);
        loop {
            tokio::select! {
                biased;
                output = &mut run => return output,
                signal = next_interrupt(&mut interrupts) => {
                    if self.request_shutdown() {
                        info!("Received {}, stopping...", signal);
                    } else {
                        warn!("Received {} again, already stopping", signal);
                    }
                }
            }
        }
    }
}

async fn next_interrupt(interrupts: &mut Option<Interrupts>) -> &'static str {
    match interrupts {
        Some(interrupts) => interrupts.recv().await,
        None => std::future::pending().await,
    }
}

struct Interrupts {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Interrupts {
    fn install() -> io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            )?,
        })
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = ctrl_c() => "Ctrl+C",
            received = self.terminate.recv() => match received {
                Some(()) => "SIGTERM",
                None => std::future::pending().await,
            },
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        ctrl_c().await;
        "Ctrl+C"
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
