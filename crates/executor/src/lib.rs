//! Bounded-concurrency, priority-ordered task executor.
//!
//! Submit deferred work to an [`Executor`]; at most N tasks run at once and
//! higher-priority pending work always starts first. Each submission returns
//! a [`TaskHandle`] that resolves with the work's own result.

pub mod config;
pub mod error;
pub mod executor;
pub mod host;
pub mod metrics;
pub mod queue;
pub mod sink;
pub mod task;

pub use config::ExecutorConfig;
pub use error::{ConfigError, TaskError};
pub use executor::{Executor, ExecutorBuilder};
pub use host::{
    CapacityProbe, FixedCapacity, FixedName, HostParallelism, NameGenerator, RandomNames,
};
pub use metrics::ExecutorStats;
pub use queue::{PendingQueue, Prioritized};
pub use sink::{ExecutorEvent, LogSink, MemorySink, TracingSink};
pub use task::{BoxedWork, Priority, TaskHandle, TaskSpec};
