//! The executor -- a cloneable handle in front of a single-owner run loop.
//!
//! Split into focused submodules:
//! - `core`: Executor handle, builder, and submission methods
//! - `run_loop`: command processing, dispatch passes, and task start/finish bookkeeping

mod core;
mod run_loop;

pub use self::core::{Executor, ExecutorBuilder};
