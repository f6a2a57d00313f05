//! Pool-free execution substrate.
//!
//! This module defines the [`CallExecutor`], which runs every accepted call on
//! its own Tokio task. There is no worker budget, no queue and no admission
//! control: a call is spawned the moment it is accepted, and blocking work
//! inside it (the simulated delay) is an async sleep that parks only that
//! task. One slow call never holds up another.
//!
//! The executor tracks how many calls are in flight and owns the root
//! [`CancellationToken`]. Each call receives a child token, so shutdown can
//! interrupt every call that is still running after the drain window.
//!
//! - [`tag`] - Descriptor of the task executing a call.

pub mod tag;

use core::{future::Future, time::Duration};
use greeter_tonic_core::{Error, Result, types::CallShape};
use portable_atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{
    task::JoinHandle,
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;

/// Spawns one task per call and coordinates their shutdown.
#[derive(Debug)]
pub struct CallExecutor {
    accepting: AtomicBool,
    inflight: AtomicUsize,
    next_call_id: AtomicU64,
    shutdown_token: CancellationToken,
}

impl Default for CallExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CallExecutor {
    pub fn new() -> Self {
        Self {
            accepting: AtomicBool::new(true),
            inflight: AtomicUsize::new(0),
            next_call_id: AtomicU64::new(0),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Number of calls whose task has not finished yet.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    /// Whether new calls are still admitted.
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Runs a call on a new task.
    ///
    /// `call` receives the call's own cancellation token, a child of the
    /// executor's shutdown token. The in-flight count is released when the
    /// task finishes, including when it panics or is aborted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once shutdown has begun.
    pub fn spawn<T, F, Fut>(self: &Arc<Self>, shape: CallShape, call: F) -> Result<JoinHandle<T>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if !self.is_accepting() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Refusing {shape} call: shutting down");
            return Err(Error::ServiceShutdown);
        }

        let _call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        self.inflight.fetch_add(1, Ordering::AcqRel);
        let guard = InflightGuard {
            executor: Arc::clone(self),
        };

        let fut = call(self.shutdown_token.child_token());
        let fut = async move {
            let _guard = guard;
            fut.await
        };

        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::info_span!("call", id = _call_id, shape = %shape))
        };
        #[cfg(not(feature = "tracing"))]
        let _ = shape;

        Ok(tokio::spawn(fut))
    }

    /// Gracefully shuts down the executor.
    ///
    /// - Refuses new calls.
    /// - Waits up to `drain_timeout` for in-flight calls to finish.
    /// - Cancels the calls that are still running; they end in a failed
    ///   state at their next suspension point.
    /// - Waits (up to 3 seconds) for the cancelled calls to unwind.
    pub async fn shutdown(&self, drain_timeout: Duration) -> Result<()> {
        // === Phase 0: Stop accepting new calls ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new calls");
        self.accepting.store(false, Ordering::Release);

        // === Phase 1: Wait for in-flight calls to drain ===
        #[cfg(feature = "tracing")]
        tracing::info!("Draining in-flight calls ({} active)", self.inflight());
        match timeout(drain_timeout, self.wait_idle()).await {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("All in-flight calls drained successfully");
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Graceful drain timed out ({} calls still active)",
                    self.inflight()
                );
            }
        }

        // === Phase 2: Cancel any remaining calls ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Cancelling remaining calls via shutdown token");
        self.shutdown_token.cancel();

        // === Phase 3: Let cancelled calls unwind ===
        if timeout(Duration::from_secs(3), self.wait_idle())
            .await
            .is_err()
        {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "{} calls did not unwind after cancellation",
                self.inflight()
            );
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Call executor shutdown complete");

        Ok(())
    }

    async fn wait_idle(&self) {
        while self.inflight() > 0 {
            sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Releases one in-flight slot when a call's task ends.
struct InflightGuard {
    executor: Arc<CallExecutor>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.executor.inflight.fetch_sub(1, Ordering::AcqRel);
    }
}
