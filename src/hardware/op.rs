use std::future::Future;
use std::time::Duration;

use strum_macros::Display;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Where a spawned hardware operation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OpStatus {
    Running,
    Done,
    Failed,
}

/// Handle to a hardware operation running on its own task.
///
/// Completion is reported through a watch channel rather than the join
/// handle, so callers can poll between safety checks without blocking on
/// the task. Dropping the handle does not cancel the work; the spawned
/// task keeps running until it resolves or is told to stop.
pub struct AsyncOp {
    what: &'static str,
    status: watch::Receiver<OpStatus>,
    cancel: CancellationToken,
}

impl AsyncOp {
    /// Spawns `work` with a fresh cancellation token and the status sender
    /// through which it must report [`OpStatus::Done`] or
    /// [`OpStatus::Failed`].
    pub fn spawn<F, Fut>(what: &'static str, work: F) -> Self
    where
        F: FnOnce(CancellationToken, watch::Sender<OpStatus>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = watch::channel(OpStatus::Running);
        let cancel = CancellationToken::new();
        tokio::spawn(work(cancel.clone(), tx));
        Self { what, status: rx, cancel }
    }

    pub fn what(&self) -> &'static str { self.what }

    /// Last reported status, without waiting.
    pub fn poll(&self) -> OpStatus { *self.status.borrow() }

    /// Requests cancellation; the operation decides how fast it honors it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits up to `grace` for the operation to leave
    /// [`OpStatus::Running`]. Returns whether it settled in time.
    pub async fn acknowledged(&mut self, grace: Duration) -> bool {
        let settled =
            tokio::time::timeout(grace, self.status.wait_for(|s| *s != OpStatus::Running));
        matches!(settled.await, Ok(Ok(_)))
    }
}
