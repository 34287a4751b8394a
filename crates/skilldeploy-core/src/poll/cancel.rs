//! Cancellation and deadlines for long-running polls.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::DeployError;

/// Fires a [`Cancellation`] from elsewhere (e.g. a Ctrl-C handler).
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Stop condition threaded through every poll.
///
/// Wraps an optional caller-driven signal and an optional deadline. Futures
/// run under [`Cancellation::guard`] are dropped as soon as either fires,
/// which aborts the in-flight request.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    signal: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// Never cancels.
    pub fn none() -> Self {
        Self::default()
    }

    /// A cancellation driven by the returned handle.
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx },
            Self {
                signal: Some(rx),
                deadline: None,
            },
        )
    }

    /// Additionally stop once `timeout` has elapsed from now.
    ///
    /// A timeout too large to represent adds no deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let Some(deadline) = Instant::now().checked_add(timeout) {
            self.deadline = Some(deadline);
        }
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Error for the stop condition that has already fired, if any.
    pub fn check(&self) -> Result<(), DeployError> {
        if self.signal.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Err(DeployError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(DeployError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run `fut` unless cancellation or the deadline wins first.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, DeployError> {
        self.check()?;
        tokio::select! {
            biased;
            err = self.stopped() => Err(err),
            out = fut => Ok(out),
        }
    }

    /// Sleep for `delay`, returning early with an error if stopped.
    pub async fn sleep(&self, delay: Duration) -> Result<(), DeployError> {
        self.guard(tokio::time::sleep(delay)).await
    }

    async fn stopped(&self) -> DeployError {
        let signal = async {
            if let Some(rx) = &self.signal {
                let mut rx = rx.clone();
                if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
                    return;
                }
            }
            // No signal, or the handle was dropped without cancelling.
            std::future::pending::<()>().await
        };
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = signal => DeployError::Cancelled,
            _ = deadline => DeployError::DeadlineExceeded,
        }
    }
}
