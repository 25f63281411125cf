//! Builders to assemble a scheduler from configuration.

pub mod scheduler_builder;

pub use scheduler_builder::{build_memory_store, open_memory_store, SchedulerBuilder};
