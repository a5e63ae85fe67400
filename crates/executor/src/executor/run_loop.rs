use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::metrics::ExecutorStats;
use crate::queue::PendingQueue;
use crate::sink::{ExecutorEvent, LogSink};
use crate::task::{Outcome, Task};

/// Messages processed by the run loop, strictly in arrival order.
pub(crate) enum Command {
    /// A new task to enqueue.
    Submit(Task),
    /// Run one dispatch pass.
    Dispatch,
    /// A started task has settled.
    Finished {
        name: String,
        outcome: Outcome,
        elapsed: Duration,
    },
    /// Reply with a stats snapshot.
    Stats(oneshot::Sender<ExecutorStats>),
    /// Cancel pending work and reply once nothing is running.
    Shutdown(oneshot::Sender<()>),
    /// The last executor handle was dropped.
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Open,
    /// No handles left: finish queued work, then exit.
    Draining,
    /// Pending work cancelled, no new work accepted.
    ShuttingDown,
}

/// Sole owner of the pending queue and the running counter.
pub(crate) struct RunLoop {
    name: String,
    limit: usize,
    pending: PendingQueue<Task>,
    running: usize,
    stats: ExecutorStats,
    sink: Option<Arc<dyn LogSink>>,
    lifecycle: Lifecycle,
    idle_waiters: Vec<oneshot::Sender<()>>,
    tx: mpsc::UnboundedSender<Command>,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl RunLoop {
    pub(crate) fn new(
        name: String,
        limit: usize,
        sink: Option<Arc<dyn LogSink>>,
        tx: mpsc::UnboundedSender<Command>,
        rx: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            stats: ExecutorStats::new(name.clone(), limit),
            name,
            limit,
            pending: PendingQueue::new(),
            running: 0,
            sink,
            lifecycle: Lifecycle::Open,
            idle_waiters: Vec::new(),
            tx,
            rx,
        }
    }

    /// Process commands until the executor is closed and idle.
    pub(crate) async fn run(mut self) {
        debug!(executor = %self.name, limit = self.limit, "executor run loop started");

        while let Some(command) = self.rx.recv().await {
            self.handle(command);
            if self.is_finished() {
                break;
            }
        }

        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
        debug!(
            executor = %self.name,
            completed = self.stats.completed(),
            cancelled = self.stats.cancelled,
            "executor run loop stopped"
        );
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Submit(task) => self.enqueue(task),
            Command::Dispatch => self.dispatch(),
            Command::Finished {
                name,
                outcome,
                elapsed,
            } => self.finish(name, outcome, elapsed),
            Command::Stats(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown(reply) => self.shutdown(reply),
            Command::Close => {
                if self.lifecycle == Lifecycle::Open {
                    debug!(
                        executor = %self.name,
                        waiting = self.pending.len(),
                        "last handle dropped, draining"
                    );
                    self.lifecycle = Lifecycle::Draining;
                }
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.lifecycle != Lifecycle::Open && self.pending.is_empty() && self.running == 0
    }

    /// Post a dispatch pass behind whatever is already queued.
    fn schedule_dispatch(&self) {
        // We hold the receiver, so the channel cannot be closed here.
        let _ = self.tx.send(Command::Dispatch);
    }

    /// Hand an event to the sink. A panicking sink loses the event, not the loop.
    fn emit(&self, event: ExecutorEvent) {
        let Some(sink) = &self.sink else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(|| sink.log(&self.name, &event))).is_err() {
            warn!(executor = %self.name, event = event.label(), "log sink panicked");
        }
    }

    fn enqueue(&mut self, task: Task) {
        if self.lifecycle == Lifecycle::ShuttingDown {
            debug!(
                executor = %self.name,
                task = %task.name,
                "rejecting task submitted after shutdown"
            );
            self.stats.cancelled += 1;
            return;
        }
        self.stats.submitted += 1;
        self.pending.insert(task);
        self.schedule_dispatch();
    }

    /// One dispatch pass: start at most one task, then reschedule.
    fn dispatch(&mut self) {
        self.emit(ExecutorEvent::Queue {
            waiting: self.pending.len(),
            running: self.running,
            limit: self.limit,
        });

        if self.running >= self.limit {
            return;
        }

        if let Some(task) = self.pending.pop_front() {
            self.start(task);
            self.schedule_dispatch();
        }
    }

    fn start(&mut self, task: Task) {
        self.running += 1;
        self.stats.started += 1;
        self.emit(ExecutorEvent::Starting {
            task: task.name.clone(),
        });

        let tx = self.tx.clone();
        let name = task.name.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = task.run().await;
            let _ = tx.send(Command::Finished {
                name,
                outcome,
                elapsed: started.elapsed(),
            });
        });
    }

    fn finish(&mut self, name: String, outcome: Outcome, elapsed: Duration) {
        self.running = self.running.saturating_sub(1);
        self.stats.record_completion(outcome, elapsed);

        match outcome {
            Outcome::Succeeded => {}
            Outcome::Failed => debug!(executor = %self.name, task = %name, "task failed"),
            Outcome::Panicked => warn!(executor = %self.name, task = %name, "task panicked"),
            Outcome::Cancelled => {
                debug!(executor = %self.name, task = %name, "task cancelled while running")
            }
        }

        self.emit(ExecutorEvent::Done { task: name });
        self.schedule_dispatch();
    }

    fn shutdown(&mut self, reply: oneshot::Sender<()>) {
        if self.lifecycle != Lifecycle::ShuttingDown {
            let cancelled = self.pending.len();
            // Dropping a pending task resolves its handle as cancelled.
            self.pending.drain().for_each(drop);
            self.stats.cancelled += cancelled as u64;
            self.lifecycle = Lifecycle::ShuttingDown;
            debug!(
                executor = %self.name,
                cancelled,
                running = self.running,
                "executor shutting down"
            );
        }
        self.idle_waiters.push(reply);
    }

    fn snapshot(&self) -> ExecutorStats {
        ExecutorStats {
            waiting: self.pending.len(),
            running: self.running,
            ..self.stats.clone()
        }
    }
}
