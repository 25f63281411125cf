//! Assemble a [`Scheduler`] from configuration, a store, a registry and the
//! collaborator ports.

use std::path::Path;
use std::sync::Arc;

use crate::config::{ResolverConfig, SchedulerConfig};
use crate::core::{
    registry, CheckError, CheckStore, CheckerRegistry, DomainStore, IdentityStore, OptionResolver,
    OptionStore, ResultStore, Scheduler, ZoneStore,
};
use crate::infra::MemoryStore;
use crate::util::{Clock, SystemClock};

/// In-memory store sized from `config`.
pub fn build_memory_store(config: &SchedulerConfig) -> MemoryStore {
    MemoryStore::new().with_results_per_tuple(config.results_per_tuple)
}

/// Persistent store at `path` sized from `config`.
///
/// # Errors
///
/// `Storage` if the snapshot cannot be read or its directory created.
pub fn open_memory_store(
    path: impl AsRef<Path>,
    config: &SchedulerConfig,
) -> Result<MemoryStore, CheckError> {
    MemoryStore::open(path, config.results_per_tuple)
}

/// Builder for [`Scheduler`].
///
/// Defaults: the process-wide registry, an in-memory store, the system clock
/// and no collaborator ports.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    resolver_config: ResolverConfig,
    registry: Option<Arc<CheckerRegistry>>,
    store: Option<(Arc<dyn CheckStore>, Arc<dyn OptionStore>)>,
    identities: Option<Arc<dyn IdentityStore>>,
    domains: Option<Arc<dyn DomainStore>>,
    zones: Option<Arc<dyn ZoneStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SchedulerBuilder {
    /// Start from a scheduler configuration.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            resolver_config: ResolverConfig::default(),
            registry: None,
            store: None,
            identities: None,
            domains: None,
            zones: None,
            clock: None,
        }
    }

    /// Use `store` for options, schedules, executions and results. The
    /// configured `results_per_tuple` is applied to it on `build`.
    #[must_use]
    pub fn with_store<S>(mut self, store: Arc<S>) -> Self
    where
        S: CheckStore + 'static,
    {
        let options: Arc<dyn OptionStore> = Arc::clone(&store) as Arc<dyn OptionStore>;
        self.store = Some((store as Arc<dyn CheckStore>, options));
        self
    }

    /// Use a dedicated registry instead of the process-wide one.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<CheckerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Identity port for `owner_email` auto-fill.
    #[must_use]
    pub fn with_identities(mut self, identities: Arc<dyn IdentityStore>) -> Self {
        self.identities = Some(identities);
        self
    }

    /// Domain port for `domain_name` and service auto-fill.
    #[must_use]
    pub fn with_domains(mut self, domains: Arc<dyn DomainStore>) -> Self {
        self.domains = Some(domains);
        self
    }

    /// Zone port for service auto-fill.
    #[must_use]
    pub fn with_zones(mut self, zones: Arc<dyn ZoneStore>) -> Self {
        self.zones = Some(zones);
        self
    }

    /// Wire one directory as identity, domain and zone port.
    #[must_use]
    pub fn with_directory<D>(self, directory: Arc<D>) -> Self
    where
        D: IdentityStore + DomainStore + ZoneStore + 'static,
    {
        let identities: Arc<dyn IdentityStore> = Arc::clone(&directory) as Arc<dyn IdentityStore>;
        let domains: Arc<dyn DomainStore> = Arc::clone(&directory) as Arc<dyn DomainStore>;
        self.with_identities(identities)
            .with_domains(domains)
            .with_zones(directory)
    }

    /// Time source for execution and schedule timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Option resolver settings.
    #[must_use]
    pub const fn with_resolver_config(mut self, config: ResolverConfig) -> Self {
        self.resolver_config = config;
        self
    }

    /// Build a stopped scheduler.
    ///
    /// # Errors
    ///
    /// `Validation` if the configuration is invalid.
    pub fn build(self) -> Result<Scheduler, CheckError> {
        self.config.validate().map_err(CheckError::Validation)?;

        let registry = self.registry.unwrap_or_else(registry::global);
        let (store, options) = match self.store {
            Some(pair) => pair,
            None => {
                let store = Arc::new(build_memory_store(&self.config));
                let options: Arc<dyn OptionStore> = Arc::clone(&store) as Arc<dyn OptionStore>;
                (store as Arc<dyn CheckStore>, options)
            }
        };
        store.set_results_per_tuple(self.config.results_per_tuple);

        let mut resolver =
            OptionResolver::new(Arc::clone(&registry), options).with_config(self.resolver_config);
        if let Some(identities) = self.identities {
            resolver = resolver.with_identities(identities);
        }
        if let Some(domains) = self.domains {
            resolver = resolver.with_domains(domains);
        }
        if let Some(zones) = self.zones {
            resolver = resolver.with_zones(zones);
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        Scheduler::new(self.config, store, registry, resolver, clock)
    }
}
