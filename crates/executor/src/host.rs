//! Host-facing collaborators: executor name generation and capacity probing.
//!
//! Both are traits so tests can substitute deterministic implementations.

use std::num::NonZeroUsize;

use uuid::Uuid;

/// Length of generated executor names.
pub const GENERATED_NAME_LEN: usize = 4;

/// Produces a display name for executors created without one.
pub trait NameGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random lowercase alphabetic names, drawn from v4 UUID randomness.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomNames;

impl NameGenerator for RandomNames {
    fn generate(&self) -> String {
        Uuid::new_v4()
            .as_bytes()
            .iter()
            .take(GENERATED_NAME_LEN)
            .map(|b| char::from(b'a' + b % 26))
            .collect()
    }
}

/// Always returns the same name.
#[derive(Debug, Clone)]
pub struct FixedName(pub String);

impl NameGenerator for FixedName {
    fn generate(&self) -> String {
        self.0.clone()
    }
}

/// Reports how many tasks may run at once when no explicit limit is configured.
pub trait CapacityProbe: Send + Sync {
    /// Number of available processing units. Zero means "unknown".
    fn available(&self) -> usize;
}

/// Host parallelism as reported by the standard library (1 if unavailable).
#[derive(Debug, Default, Clone, Copy)]
pub struct HostParallelism;

impl CapacityProbe for HostParallelism {
    fn available(&self) -> usize {
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }
}

/// A fixed capacity, for tests and embedders that already know their budget.
#[derive(Debug, Clone, Copy)]
pub struct FixedCapacity(pub usize);

impl CapacityProbe for FixedCapacity {
    fn available(&self) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_names_are_four_lowercase_letters() {
        for _ in 0..32 {
            let name = RandomNames.generate();
            assert_eq!(name.len(), GENERATED_NAME_LEN);
            assert!(name.chars().all(|c| c.is_ascii_lowercase()), "bad name {name}");
        }
    }

    #[test]
    fn host_parallelism_is_positive() {
        assert!(HostParallelism.available() > 0);
    }

    #[test]
    fn fixed_collaborators() {
        assert_eq!(FixedName("pool".into()).generate(), "pool");
        assert_eq!(FixedCapacity(3).available(), 3);
    }
}
