//! Configuration models for the scheduler and the option resolver.

pub mod scheduler;

pub use scheduler::{ResolverConfig, SchedulerConfig};
