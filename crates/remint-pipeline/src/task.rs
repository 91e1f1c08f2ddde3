use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{PipelineError, Result};

/// A handle to one in-flight pipeline task.
///
/// Compute work reports back over a oneshot channel from the blocking pool;
/// IO work is a plain tokio task. Both join the same way: the result races
/// the task's cancellation token, so a cancel unblocks waiters even when the
/// worker itself never checks the token.
pub struct TaskHandle<T> {
    token: CancellationToken,
    outcome: Outcome<T>,
}

enum Outcome<T> {
    Blocking(oneshot::Receiver<Result<T>>),
    Async(JoinHandle<Result<T>>),
}

impl<T> TaskHandle<T> {
    pub(crate) fn blocking(token: CancellationToken, rx: oneshot::Receiver<Result<T>>) -> Self {
        Self {
            token,
            outcome: Outcome::Blocking(rx),
        }
    }

    pub(crate) fn asynchronous(token: CancellationToken, handle: JoinHandle<Result<T>>) -> Self {
        Self {
            token,
            outcome: Outcome::Async(handle),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn join(self) -> Result<T> {
        let Self { token, outcome } = self;
        let settled = async move {
            match outcome {
                // A dropped sender means the worker died without reporting.
                Outcome::Blocking(rx) => rx.await.unwrap_or(Err(PipelineError::Panicked)),
                Outcome::Async(handle) => match handle.await {
                    Ok(result) => result,
                    Err(err) if err.is_cancelled() => Err(PipelineError::Cancelled),
                    Err(_) => Err(PipelineError::Panicked),
                },
            }
        };

        tokio::select! {
            result = settled => result,
            _ = token.cancelled() => Err(PipelineError::Cancelled),
        }
    }
}
