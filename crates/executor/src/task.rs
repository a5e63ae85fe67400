use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;

use crate::error::TaskError;
use crate::queue::Prioritized;

/// Task priority. Higher values run first; the default is 0.
pub type Priority = i32;

/// Type-erased work function, as produced by [`TaskSpec::blocking`].
pub type BoxedWork<T, E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, E>> + Send>;

// ── TaskSpec ─────────────────────────────────────────────────────────

/// Descriptor for a unit of work: the work function plus optional name and priority.
///
/// The work function is not invoked until the executor starts the task.
pub struct TaskSpec<F> {
    pub(crate) work: F,
    pub(crate) name: Option<String>,
    pub(crate) priority: Priority,
}

impl<F> TaskSpec<F> {
    pub fn new(work: F) -> Self {
        Self {
            work,
            name: None,
            priority: 0,
        }
    }

    /// Display name used in logs (default: synthesized by the executor).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Scheduling priority (default: 0).
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

impl<T, E> TaskSpec<BoxedWork<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Wrap a synchronous work function. It runs on tokio's blocking pool so it
    /// does not stall the executor's other tasks.
    pub fn blocking<G>(f: G) -> Self
    where
        G: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let work: BoxedWork<T, E> = Box::new(move || {
            async move {
                match tokio::task::spawn_blocking(f).await {
                    Ok(result) => result,
                    // Re-raised so the task's unwind guard can classify it.
                    Err(err) => match err.try_into_panic() {
                        Ok(payload) => std::panic::resume_unwind(payload),
                        Err(_) => std::panic::resume_unwind(Box::new(WorkCancelled)),
                    },
                }
            }
            .boxed()
        });
        Self::new(work)
    }
}

/// Unwind payload for work that was cancelled by the runtime before it
/// could settle. The task's handle resolves to [`TaskError::Cancelled`].
#[derive(Debug)]
pub(crate) struct WorkCancelled;

// ── Task ─────────────────────────────────────────────────────────────

/// How a started task settled, as seen by the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Succeeded,
    Failed,
    Panicked,
    /// Started, but cancelled before producing a result.
    Cancelled,
}

type Job = Box<dyn FnOnce() -> BoxFuture<'static, Outcome> + Send>;

/// A submitted task, owned by the run loop while pending.
///
/// Dropping a `Task` without starting it resolves its handle to
/// [`TaskError::Cancelled`].
pub(crate) struct Task {
    pub(crate) name: String,
    pub(crate) priority: Priority,
    job: Job,
}

impl Prioritized for Task {
    fn priority(&self) -> Priority {
        self.priority
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl Task {
    /// Pair a work function with its completion channel.
    pub(crate) fn bind<F, Fut, T, E>(
        name: String,
        priority: Priority,
        work: F,
    ) -> (Task, TaskHandle<T, E>)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let job: Job = Box::new(move || {
            async move {
                let settled = AssertUnwindSafe(async move { work().await })
                    .catch_unwind()
                    .await;
                let (outcome, delivery) = match settled {
                    Ok(Ok(value)) => (Outcome::Succeeded, Ok(value)),
                    Ok(Err(e)) => (Outcome::Failed, Err(TaskError::Failed(e))),
                    // Dropping the sender resolves the handle as cancelled.
                    Err(payload) if payload.is::<WorkCancelled>() => {
                        drop(tx);
                        return Outcome::Cancelled;
                    }
                    Err(payload) => (
                        Outcome::Panicked,
                        Err(TaskError::Panicked(panic_message(&*payload))),
                    ),
                };
                // The submitter may have stopped listening; that is not our concern.
                let _ = tx.send(delivery);
                outcome
            }
            .boxed()
        });

        let handle = TaskHandle {
            name: name.clone(),
            priority,
            rx,
        };
        (Task { name, priority, job }, handle)
    }

    /// Invoke the work function. The returned future settles the task's handle
    /// before it resolves.
    pub(crate) fn run(self) -> BoxFuture<'static, Outcome> {
        (self.job)()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ── TaskHandle ───────────────────────────────────────────────────────

/// Future returned by submission; resolves with the task's result.
#[must_use = "a TaskHandle does nothing unless awaited; dropping it does not cancel the task"]
pub struct TaskHandle<T, E> {
    name: String,
    priority: Priority,
    rx: oneshot::Receiver<Result<T, TaskError<E>>>,
}

impl<T, E> TaskHandle<T, E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }
}

impl<T, E> Future for TaskHandle<T, E> {
    type Output = Result<T, TaskError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Sender dropped: the task was discarded before it ran.
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T, E> std::fmt::Debug for TaskHandle<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
