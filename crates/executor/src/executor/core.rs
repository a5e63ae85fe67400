use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::config::ExecutorConfig;
use crate::error::{ConfigError, TaskError};
use crate::host::{CapacityProbe, HostParallelism, NameGenerator, RandomNames};
use crate::metrics::ExecutorStats;
use crate::sink::{LogSink, TracingSink};
use crate::task::{Task, TaskHandle, TaskSpec};

use super::run_loop::{Command, RunLoop};

/// Bounded-concurrency, priority-ordered task executor.
///
/// At most `concurrency()` submitted tasks run at once; among waiting tasks
/// the highest priority starts first, and equal priorities start in
/// submission order. Cloning yields another handle to the same executor.
///
/// Must be created inside a tokio runtime. Dropping the last handle lets
/// already-submitted work finish; [`Executor::shutdown`] cancels it instead.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    limit: NonZeroUsize,
    next_task: AtomicU64,
    tx: mpsc::UnboundedSender<Command>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Close);
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("name", &self.inner.name)
            .field("concurrency", &self.inner.limit)
            .finish()
    }
}

impl Executor {
    /// Create an executor running at most `limit` tasks at once, with a
    /// generated name and logging disabled.
    pub fn new(limit: usize) -> Result<Self, ConfigError> {
        Self::with_config(ExecutorConfig::from(limit))
    }

    /// Create an executor from a configuration with default collaborators.
    pub fn with_config(config: ExecutorConfig) -> Result<Self, ConfigError> {
        ExecutorBuilder::from_config(config).build()
    }

    pub fn builder() -> ExecutorBuilder {
        ExecutorBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn concurrency(&self) -> usize {
        self.inner.limit.get()
    }

    /// Whether the run loop has stopped (after shutdown completes).
    pub fn is_closed(&self) -> bool {
        self.inner.tx.is_closed()
    }

    /// Submit a bare work function with default priority and a generated name.
    pub fn submit<F, Fut, T, E>(&self, work: F) -> TaskHandle<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.submit_task(TaskSpec::new(work))
    }

    /// Submit a task descriptor.
    ///
    /// Never blocks: the task is queued immediately and the returned handle
    /// resolves once the work function settles.
    pub fn submit_task<F, Fut, T, E>(&self, spec: TaskSpec<F>) -> TaskHandle<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let name = spec.name.unwrap_or_else(|| self.next_task_name());
        let (task, handle) = Task::bind(name, spec.priority, spec.work);
        // If the run loop is gone the task is dropped here and the handle
        // resolves as cancelled.
        let _ = self.inner.tx.send(Command::Submit(task));
        handle
    }

    /// Submit every work function in order and wait for all of them.
    ///
    /// All tasks are queued before this returns. The future resolves with the
    /// results in submission order, or with the first failure to settle,
    /// whatever its position; the remaining tasks keep running either way.
    pub fn submit_all<I, F, Fut, T, E>(
        &self,
        works: I,
    ) -> impl Future<Output = Result<Vec<T>, TaskError<E>>> + Send + 'static
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let handles: Vec<_> = works.into_iter().map(|work| self.submit(work)).collect();
        settle_in_order(handles)
    }

    /// Snapshot of queue depth, in-flight count and lifetime counters.
    /// `None` once the executor has shut down.
    pub async fn stats(&self) -> Option<ExecutorStats> {
        let (reply, rx) = oneshot::channel();
        self.inner.tx.send(Command::Stats(reply)).ok()?;
        rx.await.ok()
    }

    /// Cancel all pending tasks, stop accepting new ones, and wait for
    /// running tasks to finish. Safe to call more than once.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.inner.tx.send(Command::Shutdown(reply)).is_err() {
            return;
        }
        let _ = rx.await;
    }

    fn next_task_name(&self) -> String {
        let n = self.inner.next_task.fetch_add(1, Ordering::Relaxed) + 1;
        format!("task-{n}")
    }
}

/// Await every handle as it settles, bailing out on the first error, and
/// return the values in handle order.
async fn settle_in_order<T, E>(handles: Vec<TaskHandle<T, E>>) -> Result<Vec<T>, TaskError<E>> {
    let mut slots: Vec<Option<T>> = (0..handles.len()).map(|_| None).collect();
    let mut settling: FuturesUnordered<_> = handles
        .into_iter()
        .enumerate()
        .map(|(index, handle)| handle.map(move |result| (index, result)))
        .collect();

    while let Some((index, result)) = settling.next().await {
        slots[index] = Some(result?);
    }
    Ok(slots.into_iter().flatten().collect())
}

// ── ExecutorBuilder ──────────────────────────────────────────────────

/// Fluent builder for an [`Executor`].
///
/// # Example
/// ```ignore
/// let executor = Executor::builder()
///     .concurrency(4)
///     .name("crawler")
///     .logging(true)
///     .build()?;
/// ```
pub struct ExecutorBuilder {
    config: ExecutorConfig,
    sink: Option<Arc<dyn LogSink>>,
    names: Box<dyn NameGenerator>,
    probe: Box<dyn CapacityProbe>,
}

impl Default for ExecutorBuilder {
    fn default() -> Self {
        Self::from_config(ExecutorConfig::default())
    }
}

impl ExecutorBuilder {
    pub fn from_config(config: ExecutorConfig) -> Self {
        Self {
            config,
            sink: None,
            names: Box::new(RandomNames),
            probe: Box::new(HostParallelism),
        }
    }

    /// Maximum concurrently running tasks (default: host parallelism).
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.config.concurrency = Some(limit);
        self
    }

    /// Display name (default: generated).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Toggle Queue/Starting/Done events (default: off).
    pub fn logging(mut self, enabled: bool) -> Self {
        self.config.logging = enabled;
        self
    }

    /// Send lifecycle events to `sink` instead of `tracing`. Enables logging.
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self.config.logging = true;
        self
    }

    pub fn name_generator(mut self, names: impl NameGenerator + 'static) -> Self {
        self.names = Box::new(names);
        self
    }

    pub fn capacity_probe(mut self, probe: impl CapacityProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// Validate the configuration and spawn the run loop on the current runtime.
    pub fn build(self) -> Result<Executor, ConfigError> {
        let limit = self.config.resolve_concurrency(self.probe.as_ref())?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        let name = self
            .config
            .name
            .clone()
            .unwrap_or_else(|| self.names.generate());
        let sink = if self.config.logging {
            Some(self.sink.unwrap_or_else(|| Arc::new(TracingSink)))
        } else {
            None
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let run_loop = RunLoop::new(name.clone(), limit.get(), sink, tx.clone(), rx);
        runtime.spawn(run_loop.run());

        info!(executor = %name, concurrency = limit.get(), "executor created");

        Ok(Executor {
            inner: Arc::new(Inner {
                name,
                limit,
                next_task: AtomicU64::new(0),
                tx,
            }),
        })
    }
}
