//! Process-wide table of checker plugins.
//!
//! Registration happens during process init. [`CheckerRegistry::freeze`] is
//! called when the scheduler starts; afterwards the table is immutable, further
//! registrations are rejected and lookups read the frozen map without locking.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::{CheckError, Checker};

type CheckerMap = BTreeMap<String, Arc<dyn Checker>>;

/// Table of checker plugins keyed by name.
#[derive(Default)]
pub struct CheckerRegistry {
    /// Registrations collected before the freeze.
    pending: Mutex<CheckerMap>,
    /// Read-only snapshot once frozen.
    frozen: OnceLock<CheckerMap>,
}

impl CheckerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a checker under its own name.
    ///
    /// # Errors
    ///
    /// `Validation` if the name is taken or the registry is frozen.
    pub fn register(&self, checker: Arc<dyn Checker>) -> Result<(), CheckError> {
        let name = checker.name().to_string();
        let mut pending = self.pending.lock();
        if self.frozen.get().is_some() {
            return Err(CheckError::Validation(format!(
                "cannot register checker `{name}`: registry is frozen"
            )));
        }
        if pending.contains_key(&name) {
            return Err(CheckError::Validation(format!(
                "checker `{name}` is already registered"
            )));
        }
        tracing::debug!(checker = %name, "checker registered");
        pending.insert(name, checker);
        Ok(())
    }

    /// Make the registry read-only. Idempotent.
    pub fn freeze(&self) {
        let pending = self.pending.lock();
        if self.frozen.set(pending.clone()).is_ok() {
            tracing::info!(checkers = pending.len(), "checker registry frozen");
        }
    }

    /// Whether [`CheckerRegistry::freeze`] has been called.
    pub fn is_frozen(&self) -> bool {
        self.frozen.get().is_some()
    }

    /// Look up a checker.
    ///
    /// # Errors
    ///
    /// `UnknownChecker` if no plugin has that name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Checker>, CheckError> {
        let found = match self.frozen.get() {
            Some(map) => map.get(name).cloned(),
            None => self.pending.lock().get(name).cloned(),
        };
        found.ok_or_else(|| CheckError::UnknownChecker(name.to_string()))
    }

    /// Whether a checker is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// All checkers ordered by name.
    pub fn list(&self) -> Vec<Arc<dyn Checker>> {
        match self.frozen.get() {
            Some(map) => map.values().cloned().collect(),
            None => self.pending.lock().values().cloned().collect(),
        }
    }

    /// Number of registered checkers.
    pub fn len(&self) -> usize {
        match self.frozen.get() {
            Some(map) => map.len(),
            None => self.pending.lock().len(),
        }
    }

    /// Whether no checker is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The process-wide registry, shared by every scheduler that does not bring its
/// own. Register plugins before the first scheduler starts; the start freezes it.
pub fn global() -> Arc<CheckerRegistry> {
    static GLOBAL: OnceLock<Arc<CheckerRegistry>> = OnceLock::new();
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(CheckerRegistry::new())))
}
