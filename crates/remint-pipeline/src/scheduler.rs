//! Fixed-degree parallel scheduling with typed task categories.
//!
//! Compute work runs on a rayon pool, IO on a tokio runtime. Each task
//! category may cap its in-flight count independently via a semaphore, and
//! every task carries a cancellation token that is polled cooperatively.

use std::{future::Future, sync::Arc};

use rayon::ThreadPool;
use tokio::runtime::Runtime;
use tokio::sync::{oneshot, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::task::TaskHandle;
use crate::{PipelineError, Result};

/// The task categories of the pipeline. Categories exist so the driver can
/// throttle the expensive phases independently (e.g. two concurrent remaps,
/// eight concurrent downloads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Download,
    ReadMappings,
    Remap,
    PostProcess,
    ExtractResource,
}

impl TaskKind {
    const ALL: [TaskKind; 5] = [
        TaskKind::Download,
        TaskKind::ReadMappings,
        TaskKind::Remap,
        TaskKind::PostProcess,
        TaskKind::ExtractResource,
    ];

    fn slot(self) -> usize {
        match self {
            TaskKind::Download => 0,
            TaskKind::ReadMappings => 1,
            TaskKind::Remap => 2,
            TaskKind::PostProcess => 3,
            TaskKind::ExtractResource => 4,
        }
    }
}

/// Per-category in-flight caps; `None` means unbounded.
#[derive(Debug, Clone, Default)]
pub struct CategoryLimits {
    limits: [Option<usize>; 5],
}

impl CategoryLimits {
    pub fn with(mut self, kind: TaskKind, limit: usize) -> Self {
        self.limits[kind.slot()] = Some(limit.max(1));
        self
    }

    pub fn get(&self, kind: TaskKind) -> Option<usize> {
        self.limits[kind.slot()]
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub compute_threads: usize,
    pub io_threads: usize,
    pub category_limits: CategoryLimits,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        // Remap work is memory-hungry (whole class sets live in RAM per
        // job), so past a dozen workers more parallelism mostly buys
        // contention.
        let cores = std::thread::available_parallelism().map_or(2, |n| n.get());
        Self {
            compute_threads: cores.min(12),
            io_threads: 2,
            category_limits: CategoryLimits::default(),
        }
    }
}

fn compute_pool(threads: usize) -> ThreadPool {
    let build = |n: usize| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(|idx| format!("remint-compute-{idx}"))
            .build()
    };
    // Sandboxes with tight thread limits can refuse the full pool; a single
    // worker still makes progress.
    build(threads.max(1))
        .or_else(|_| build(1))
        .expect("rayon pool with one worker")
}

fn io_runtime(threads: usize) -> Runtime {
    let build = |n: usize| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(n)
            .enable_all()
            .thread_name("remint-io")
            .build()
    };
    build(threads.max(1))
        .or_else(|_| build(1))
        .expect("tokio runtime with one worker")
}

/// Owns the IO runtime. The scheduler itself may be dropped from async
/// context, where tokio's default blocking shutdown panics; hand the
/// teardown to a background thread instead.
struct OwnedRuntime(Option<Runtime>);

impl OwnedRuntime {
    fn handle(&self) -> tokio::runtime::Handle {
        self.0.as_ref().expect("runtime owned until drop").handle().clone()
    }
}

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    compute_pool: ThreadPool,
    io: Option<OwnedRuntime>,
    io_handle: tokio::runtime::Handle,
    semaphores: [Option<Arc<Semaphore>>; 5],
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let io = OwnedRuntime(Some(io_runtime(config.io_threads)));
        let io_handle = io.handle();
        Self::build(config, Some(io), io_handle)
    }

    /// Reuses an existing tokio runtime for IO tasks, for callers already
    /// running inside one (e.g. `#[tokio::main]` binaries and tests).
    pub fn new_with_io_handle(config: SchedulerConfig, io_handle: tokio::runtime::Handle) -> Self {
        Self::build(config, None, io_handle)
    }

    fn build(
        config: SchedulerConfig,
        io: Option<OwnedRuntime>,
        io_handle: tokio::runtime::Handle,
    ) -> Self {
        let compute_pool = compute_pool(config.compute_threads);

        let mut semaphores: [Option<Arc<Semaphore>>; 5] = Default::default();
        for kind in TaskKind::ALL {
            if let Some(limit) = config.category_limits.get(kind) {
                semaphores[kind.slot()] = Some(Arc::new(Semaphore::new(limit)));
            }
        }

        Self {
            inner: Arc::new(SchedulerInner {
                compute_pool,
                io,
                io_handle,
                semaphores,
            }),
        }
    }

    pub fn io_handle(&self) -> tokio::runtime::Handle {
        self.inner.io_handle.clone()
    }

    fn semaphore(&self, kind: TaskKind) -> Option<Arc<Semaphore>> {
        self.inner.semaphores[kind.slot()].clone()
    }

    /// Dispatches CPU-bound work to the compute pool, gated by its
    /// category's cap. The closure receives the task's cancellation token
    /// and is expected to poll it between work items.
    pub fn spawn_compute<T, F>(
        &self,
        kind: TaskKind,
        token: CancellationToken,
        f: F,
    ) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        if token.is_cancelled() {
            let _ = tx.send(Err(PipelineError::Cancelled));
            return TaskHandle::blocking(token, rx);
        }

        let scheduler = self.clone();
        let semaphore = self.semaphore(kind);
        let token_for_job = token.clone();
        self.inner.io_handle.spawn(async move {
            let _permit = match &semaphore {
                Some(semaphore) => match semaphore.clone().acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        let _ = tx.send(Err(PipelineError::Cancelled));
                        return;
                    }
                },
                None => None,
            };
            if token_for_job.is_cancelled() {
                let _ = tx.send(Err(PipelineError::Cancelled));
                return;
            }

            let (done_tx, done_rx) = oneshot::channel();
            let token_for_closure = token_for_job.clone();
            scheduler.inner.compute_pool.spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    f(token_for_closure)
                }))
                .unwrap_or(Err(PipelineError::Panicked));
                let _ = done_tx.send(result);
            });

            let result = done_rx.await.unwrap_or(Err(PipelineError::Panicked));
            let _ = tx.send(result);
            drop(_permit);
        });

        TaskHandle::blocking(token, rx)
    }

    /// Spawns IO-bound work on the async runtime, gated by its category's
    /// cap.
    pub fn spawn_io<T, F, Fut>(&self, kind: TaskKind, token: CancellationToken, f: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if token.is_cancelled() {
            let handle = self
                .io_handle()
                .spawn(async { Err(PipelineError::Cancelled) });
            return TaskHandle::asynchronous(token, handle);
        }

        let semaphore = self.semaphore(kind);
        let token_for_fut = token.clone();
        let handle = self.io_handle().spawn(async move {
            let _permit = match &semaphore {
                Some(semaphore) => match semaphore.clone().acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return Err(PipelineError::Cancelled),
                },
                None => None,
            };
            if token_for_fut.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            f(token_for_fut).await
        });
        TaskHandle::asynchronous(token, handle)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    fn test_scheduler(limits: CategoryLimits) -> Scheduler {
        Scheduler::new_with_io_handle(
            SchedulerConfig {
                compute_threads: 4,
                io_threads: 1,
                category_limits: limits,
            },
            tokio::runtime::Handle::current(),
        )
    }

    #[tokio::test]
    async fn compute_tasks_produce_results() {
        let scheduler = test_scheduler(CategoryLimits::default());
        let task = scheduler.spawn_compute(TaskKind::Remap, CancellationToken::new(), |_token| {
            Ok(2 + 2)
        });
        assert_eq!(task.join().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let scheduler = test_scheduler(CategoryLimits::default());
        let token = CancellationToken::new();
        token.cancel();
        let task = scheduler.spawn_compute(TaskKind::Remap, token, |_token| Ok(1));
        assert!(matches!(task.join().await, Err(PipelineError::Cancelled)));
    }

    #[tokio::test]
    async fn join_unblocks_when_cancelled_mid_task() {
        let scheduler = test_scheduler(CategoryLimits::default());
        let token = CancellationToken::new();
        let task = scheduler.spawn_compute(TaskKind::Remap, token.clone(), |_token| {
            // A worker that never looks at its token.
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        });

        token.cancel();
        let result = tokio::time::timeout(Duration::from_millis(100), task.join())
            .await
            .expect("join must not wait for the uncooperative worker");
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[tokio::test]
    async fn category_cap_bounds_concurrency() {
        let scheduler =
            test_scheduler(CategoryLimits::default().with(TaskKind::Download, 2));

        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            tasks.push(scheduler.spawn_io(
                TaskKind::Download,
                CancellationToken::new(),
                move |_token| async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                },
            ));
        }
        for task in tasks {
            task.join().await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2, "cap exceeded");
    }

    #[tokio::test]
    async fn panicking_compute_task_reports_panicked() {
        let scheduler = test_scheduler(CategoryLimits::default());
        let task = scheduler.spawn_compute(
            TaskKind::PostProcess,
            CancellationToken::new(),
            |_token| -> Result<()> { panic!("boom") },
        );
        assert!(matches!(task.join().await, Err(PipelineError::Panicked)));
    }
}
