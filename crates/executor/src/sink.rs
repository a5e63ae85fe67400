//! Optional log sink for queue and task lifecycle events.
//!
//! When logging is enabled the run loop reports three kinds of events,
//! labelled `"Queue"`, `"Starting"` and `"Done"`. The default sink writes them
//! through `tracing`; tests and embedders can supply their own.

use std::sync::{Arc, Mutex};

use tracing::info;

/// A lifecycle event emitted by the run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorEvent {
    /// Queue state at the start of a dispatch pass.
    Queue {
        waiting: usize,
        running: usize,
        limit: usize,
    },
    /// A task is about to have its work function invoked.
    Starting { task: String },
    /// A task's work function has settled.
    Done { task: String },
}

impl ExecutorEvent {
    pub fn label(&self) -> &'static str {
        match self {
            ExecutorEvent::Queue { .. } => "Queue",
            ExecutorEvent::Starting { .. } => "Starting",
            ExecutorEvent::Done { .. } => "Done",
        }
    }
}

/// Receives lifecycle events from an executor with logging enabled.
pub trait LogSink: Send + Sync {
    fn log(&self, executor: &str, event: &ExecutorEvent);
}

/// Default sink: one `info` line per event, with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, executor: &str, event: &ExecutorEvent) {
        match event {
            ExecutorEvent::Queue {
                waiting,
                running,
                limit,
            } => info!(executor, waiting, running, limit, "{}", event.label()),
            ExecutorEvent::Starting { task } | ExecutorEvent::Done { task } => {
                info!(executor, task = %task, "{}", event.label())
            }
        }
    }
}

/// Sink that records every event in memory, in order.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<ExecutorEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far.
    pub fn events(&self) -> Vec<ExecutorEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Task names in the order they were started.
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ExecutorEvent::Starting { task } => Some(task),
                _ => None,
            })
            .collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, _executor: &str, event: &ExecutorEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_event_kind() {
        let queue = ExecutorEvent::Queue {
            waiting: 1,
            running: 0,
            limit: 2,
        };
        assert_eq!(queue.label(), "Queue");
        assert_eq!(ExecutorEvent::Starting { task: "a".into() }.label(), "Starting");
        assert_eq!(ExecutorEvent::Done { task: "a".into() }.label(), "Done");
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.log("ex", &ExecutorEvent::Starting { task: "a".into() });
        sink.log("ex", &ExecutorEvent::Done { task: "a".into() });
        sink.log("ex", &ExecutorEvent::Starting { task: "b".into() });

        assert_eq!(sink.events().len(), 3);
        assert_eq!(sink.started(), vec!["a".to_string(), "b".to_string()]);
    }
}
