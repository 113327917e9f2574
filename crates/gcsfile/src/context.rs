//! Cancellation and deadline propagation for blocking storage calls

use crate::{CloudError, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

/// Execution context carried by every handle and passed to every network call.
///
/// Cancelling a context cancels every context derived from it. A deadline on
/// a derived context never extends the parent's deadline.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context that is cancelled together with this one
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a context that expires after `timeout`. A timeout too large
    /// to represent adds no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// Derive a context that expires at `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancel this context and everything derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The error this context reports when it can no longer be used
    pub fn err(&self) -> Option<CloudError> {
        if self.is_cancelled() {
            return Some(CloudError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CloudError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Drive `fut` to completion on `runtime`, racing it against cancellation
    /// and the deadline.
    ///
    /// Must not be called from within an async runtime.
    pub(crate) fn block_on<F, T, E>(&self, runtime: &Runtime, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<CloudError>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        runtime.block_on(async {
            let expired = async {
                match self.deadline {
                    Some(deadline) => {
                        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                _ = self.token.cancelled() => Err(CloudError::Cancelled),
                _ = expired => Err(CloudError::DeadlineExceeded),
                res = fut => res.map_err(Into::into),
            }
        })
    }
}
