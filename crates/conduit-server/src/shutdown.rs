//! Shutdown coordination.
//!
//! A [`ShutdownSignal`] is shared by the container and every route consumer.
//! Triggering it stops consumers from taking new deliveries; each consumer
//! then waits for its in-flight deliveries before exiting.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::broadcast;

/// A cloneable, trigger-once shutdown flag that can be awaited.
///
/// # Example
///
/// ```rust
/// use conduit_server::ShutdownSignal;
///
/// let shutdown = ShutdownSignal::new();
/// let observer = shutdown.clone();
///
/// shutdown.trigger();
/// assert!(observer.is_shutdown());
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Triggers shutdown. Later calls do nothing.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine.
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once shutdown has been triggered.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Returns a future that completes when shutdown is triggered, or
    /// immediately if it already was.
    pub fn recv(&self) -> ShutdownReceiver {
        let mut receiver = self.sender.subscribe();
        ShutdownReceiver {
            triggered: Arc::clone(&self.triggered),
            // Lagged or closed both mean the sender side moved on.
            notified: Box::pin(async move {
                let _ = receiver.recv().await;
            }),
        }
    }

    /// Creates a signal that triggers on SIGTERM or SIGINT.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn with_os_signals() -> Self {
        let signal = Self::new();
        let trigger = signal.clone();

        tokio::spawn(async move {
            wait_for_os_signal().await;
            trigger.trigger();
        });

        signal
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`ShutdownSignal::recv`].
pub struct ShutdownReceiver {
    triggered: Arc<AtomicBool>,
    notified: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl std::fmt::Debug for ShutdownReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownReceiver")
            .field("triggered", &self.triggered.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Future for ShutdownReceiver {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.triggered.load(Ordering::SeqCst) {
            return Poll::Ready(());
        }
        self.notified.as_mut().poll(cx)
    }
}

async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::error!(error = %e, "failed to register signal handlers");
                    return std::future::pending().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            return std::future::pending().await;
        }
        tracing::info!("received Ctrl+C, shutting down");
    }
}
