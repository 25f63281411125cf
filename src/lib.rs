//! # happyDomain checks
//!
//! Check subsystem for happyDomain: checker plugins attached to admin, user,
//! domain or service scopes, run on schedules or on demand, with their results
//! kept per target.
//!
//! ## Components
//!
//! - **Checker registry**: process-wide set of [`core::Checker`] plugins,
//!   frozen when the scheduler starts.
//! - **Option resolver**: merges checker defaults, stored admin, user, domain
//!   and service layers, runtime options and auto-filled values.
//! - **Stores**: storage contracts for options, schedules, executions and
//!   results, with an in-memory backend in [`infra::MemoryStore`].
//! - **Scheduler**: worker threads draining a bounded dispatch queue fed by a
//!   tick loop and on-demand triggers, with coalescing, deadlines, jitter and
//!   TTL-based recovery of abandoned executions.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use happydomain_checks::builders::{open_memory_store, SchedulerBuilder};
//! use happydomain_checks::config::SchedulerConfig;
//! use happydomain_checks::core::{registry, CheckScope};
//!
//! registry::global().register(Arc::new(MyChecker))?;
//!
//! let config = SchedulerConfig::from_env()?;
//! let store = Arc::new(open_memory_store("checks.json", &config)?);
//! let scheduler = SchedulerBuilder::new(config)
//!     .with_store(store)
//!     .with_directory(directory)
//!     .build()?;
//! scheduler.start().await?;
//!
//! let id = scheduler
//!     .trigger_on_demand("zonemaster", CheckScope::Domain { domain_id }, Some(user_id), Default::default())
//!     .await?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core check abstractions, option resolution and the scheduler.
pub mod core;
/// Configuration models for the scheduler and the resolver.
pub mod config;
/// Builders to assemble a scheduler from configuration.
pub mod builders;
/// Infrastructure adapters: storage backends and collaborator stand-ins.
pub mod infra;
/// API surface consumed by the HTTP layer.
pub mod runtime;
/// Shared utilities.
pub mod util;
