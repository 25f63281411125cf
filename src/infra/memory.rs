//! In-memory storage backend with optional JSON snapshot persistence.
//!
//! All collections live behind a single mutex, which gives every trait method
//! the atomicity the storage contract asks for: coalescing lookups and inserts,
//! terminal transitions and result appends, result eviction.
//!
//! When opened with a path, every mutation is applied to a staged copy of the
//! state, written to a JSON snapshot and only then committed, so a failed
//! write leaves memory untouched. The snapshot is loaded back on open.

use std::collections::{BTreeSet, HashMap};
use std::fs::{self, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::{
    merge_options, reasons, Admission, CheckError, CheckExecution, CheckResult, CheckScope,
    CheckerOptions, CheckerSchedule, ExecutionState, ExecutionStore, Identifier, OptionLayer,
    OptionStore, ResultStore, ScheduleStore,
};

/// Default number of results kept per `(checker, scope)` tuple.
pub const DEFAULT_RESULTS_PER_TUPLE: usize = 50;

type TupleKey = (String, CheckScope);

fn tuple_key(checker_name: &str, scope: &CheckScope) -> TupleKey {
    (checker_name.to_string(), *scope)
}

/// Serialized form of the store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    layers: Vec<OptionLayer>,
    schedules: Vec<CheckerSchedule>,
    executions: Vec<CheckExecution>,
    results: Vec<CheckResult>,
}

#[derive(Debug, Default, Clone)]
struct State {
    layers: HashMap<TupleKey, OptionLayer>,
    schedules: HashMap<Identifier, CheckerSchedule>,
    executions: HashMap<Identifier, CheckExecution>,
    /// Non-terminal execution per tuple, used for coalescing.
    inflight: HashMap<TupleKey, Identifier>,
    results: HashMap<Identifier, CheckResult>,
    /// Result ids per tuple ordered by `(generated_at, id)`.
    results_by_tuple: HashMap<TupleKey, BTreeSet<(u128, Identifier)>>,
}

impl State {
    fn from_snapshot(snapshot: Snapshot, cap: usize) -> Self {
        let mut state = Self::default();
        for layer in snapshot.layers {
            state
                .layers
                .insert(tuple_key(&layer.checker_name, &layer.scope), layer);
        }
        for schedule in snapshot.schedules {
            state.schedules.insert(schedule.id, schedule);
        }
        for execution in snapshot.executions {
            state.index_execution(&execution);
            state.executions.insert(execution.id, execution);
        }
        for result in snapshot.results {
            state.insert_result(result, cap);
        }
        state
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            layers: self.layers.values().cloned().collect(),
            schedules: self.schedules.values().cloned().collect(),
            executions: self.executions.values().cloned().collect(),
            results: self.results.values().cloned().collect(),
        }
    }

    fn index_execution(&mut self, execution: &CheckExecution) {
        if !execution.state.is_terminal() {
            self.inflight
                .entry(tuple_key(&execution.checker_name, &execution.scope))
                .or_insert(execution.id);
        }
    }

    /// Drop `execution` from the coalescing index once it is terminal and
    /// promote any other non-terminal execution of the same tuple.
    fn unindex_execution(&mut self, execution: &CheckExecution) {
        let key = tuple_key(&execution.checker_name, &execution.scope);
        if self.inflight.get(&key) != Some(&execution.id) {
            return;
        }
        self.inflight.remove(&key);
        if let Some(other) = self.executions.values().find(|e| {
            e.id != execution.id && !e.state.is_terminal() && e.same_target(&key.0, &key.1)
        }) {
            self.inflight.insert(key, other.id);
        }
    }

    fn check_mutable(&self, id: &Identifier) -> Result<(), CheckError> {
        let stored = self
            .executions
            .get(id)
            .ok_or_else(|| CheckError::NotFound(format!("execution {id}")))?;
        if stored.state.is_terminal() {
            return Err(CheckError::IllegalTransition(format!(
                "execution {id} is already {}",
                stored.state
            )));
        }
        Ok(())
    }

    fn replace_execution(&mut self, execution: CheckExecution) {
        if execution.state.is_terminal() {
            self.unindex_execution(&execution);
        }
        self.executions.insert(execution.id, execution);
    }

    /// Insert a result, evicting the oldest ones of its tuple beyond `cap`.
    fn insert_result(&mut self, result: CheckResult, cap: usize) {
        let key = tuple_key(&result.checker_name, &result.scope);
        let ordered = self.results_by_tuple.entry(key).or_default();
        ordered.insert((result.generated_at_ms, result.id));
        let mut evicted = Vec::new();
        while ordered.len() > cap {
            if let Some((_, id)) = ordered.pop_first() {
                evicted.push(id);
            }
        }
        self.results.insert(result.id, result);
        for id in evicted {
            tracing::debug!(result_id = %id, "evicted oldest result");
            self.results.remove(&id);
        }
    }

    fn remove_result(&mut self, id: &Identifier) -> Option<CheckResult> {
        let result = self.results.remove(id)?;
        let key = tuple_key(&result.checker_name, &result.scope);
        if let Some(ordered) = self.results_by_tuple.get_mut(&key) {
            ordered.remove(&(result.generated_at_ms, result.id));
            if ordered.is_empty() {
                self.results_by_tuple.remove(&key);
            }
        }
        Some(result)
    }

    fn check_unique_schedule(&self, schedule: &CheckerSchedule) -> Result<(), CheckError> {
        let key = schedule.unique_key();
        if self
            .schedules
            .values()
            .any(|s| s.id != schedule.id && s.unique_key() == key)
        {
            return Err(CheckError::Validation(format!(
                "a schedule for checker `{}` on {} already exists for this user",
                schedule.checker_name, schedule.scope
            )));
        }
        Ok(())
    }
}

/// In-memory implementation of every store trait.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    results_per_tuple: AtomicUsize,
    path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty, non-persistent store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            results_per_tuple: AtomicUsize::new(DEFAULT_RESULTS_PER_TUPLE),
            path: None,
        }
    }

    /// Open a store persisted at `path`, loading the snapshot if it exists.
    /// Tuples holding more than `results_per_tuple` results are trimmed on load.
    pub fn open(path: impl AsRef<Path>, results_per_tuple: usize) -> Result<Self, CheckError> {
        let path = path.as_ref().to_path_buf();
        let cap = results_per_tuple.max(1);
        let snapshot = if path.exists() {
            let file = OpenOptions::new()
                .read(true)
                .open(&path)
                .map_err(CheckError::storage)?;
            serde_json::from_reader(BufReader::new(file)).map_err(CheckError::storage)?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(CheckError::storage)?;
            }
            Snapshot::default()
        };
        tracing::info!(
            path = %path.display(),
            schedules = snapshot.schedules.len(),
            executions = snapshot.executions.len(),
            results = snapshot.results.len(),
            "opened check store"
        );
        Ok(Self {
            state: Mutex::new(State::from_snapshot(snapshot, cap)),
            results_per_tuple: AtomicUsize::new(cap),
            path: Some(path),
        })
    }

    /// Set the per-tuple result cap.
    #[must_use]
    pub fn with_results_per_tuple(self, cap: usize) -> Self {
        self.results_per_tuple.store(cap.max(1), Ordering::Relaxed);
        self
    }

    /// Per-tuple result cap.
    pub fn results_per_tuple(&self) -> usize {
        self.results_per_tuple.load(Ordering::Relaxed)
    }

    /// Total number of stored results.
    pub fn result_count(&self) -> usize {
        self.state.lock().results.len()
    }

    /// Total number of stored executions.
    pub fn execution_count(&self) -> usize {
        self.state.lock().executions.len()
    }

    fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        f(&self.state.lock())
    }

    /// Apply a mutation. Persistent stores stage it on a copy and commit only
    /// once the snapshot is on disk.
    fn write<R>(
        &self,
        f: impl FnOnce(&mut State, usize) -> Result<R, CheckError>,
    ) -> Result<R, CheckError> {
        let cap = self.results_per_tuple();
        let mut state = self.state.lock();
        let Some(path) = &self.path else {
            return f(&mut state, cap);
        };
        let mut staged = state.clone();
        let out = f(&mut staged, cap)?;
        persist(path, &staged.snapshot())?;
        *state = staged;
        Ok(out)
    }
}

fn persist(path: &Path, snapshot: &Snapshot) -> Result<(), CheckError> {
    let tmp = path.with_extension("json.tmp");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .map_err(CheckError::storage)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, snapshot).map_err(CheckError::storage)?;
    writer.flush().map_err(CheckError::storage)?;
    drop(writer);
    fs::rename(&tmp, path).map_err(CheckError::storage)
}

fn sort_by_next_run(schedules: &mut [CheckerSchedule]) {
    schedules.sort_by(|a, b| a.next_run_ms.cmp(&b.next_run_ms).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl OptionStore for MemoryStore {
    async fn get_layer(
        &self,
        checker_name: &str,
        scope: &CheckScope,
    ) -> Result<Option<OptionLayer>, CheckError> {
        Ok(self.read(|s| s.layers.get(&tuple_key(checker_name, scope)).cloned()))
    }

    async fn put_layer(&self, layer: OptionLayer) -> Result<(), CheckError> {
        self.write(|s, _| {
            s.layers
                .insert(tuple_key(&layer.checker_name, &layer.scope), layer);
            Ok(())
        })
    }

    async fn merge_layer(
        &self,
        checker_name: &str,
        scope: &CheckScope,
        owner_id: Option<Identifier>,
        options: CheckerOptions,
    ) -> Result<OptionLayer, CheckError> {
        self.write(|s, _| {
            let layer = s
                .layers
                .entry(tuple_key(checker_name, scope))
                .or_insert_with(|| OptionLayer {
                    checker_name: checker_name.to_string(),
                    owner_id,
                    scope: *scope,
                    options: CheckerOptions::new(),
                });
            merge_options(&mut layer.options, &options);
            Ok(layer.clone())
        })
    }

    async fn delete_layer(&self, checker_name: &str, scope: &CheckScope) -> Result<bool, CheckError> {
        self.write(|s, _| Ok(s.layers.remove(&tuple_key(checker_name, scope)).is_some()))
    }

    async fn list_layers(&self, checker_name: &str) -> Result<Vec<OptionLayer>, CheckError> {
        Ok(self.read(|s| {
            let mut layers: Vec<_> = s
                .layers
                .values()
                .filter(|l| l.checker_name == checker_name)
                .cloned()
                .collect();
            layers.sort_by(|a, b| a.scope.cmp(&b.scope));
            layers
        }))
    }

    async fn delete_layers_by_owner(&self, owner_id: &Identifier) -> Result<usize, CheckError> {
        self.write(|s, _| {
            let before = s.layers.len();
            s.layers.retain(|_, l| l.owner_id.as_ref() != Some(owner_id));
            Ok(before - s.layers.len())
        })
    }

    async fn delete_layers_for_domain(&self, domain_id: &Identifier) -> Result<usize, CheckError> {
        self.write(|s, _| {
            let before = s.layers.len();
            s.layers.retain(|_, l| l.scope.domain_id() != Some(domain_id));
            Ok(before - s.layers.len())
        })
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn create_schedule(&self, schedule: CheckerSchedule) -> Result<(), CheckError> {
        schedule.validate()?;
        self.write(|s, _| {
            if s.schedules.contains_key(&schedule.id) {
                return Err(CheckError::Validation(format!(
                    "schedule {} already exists",
                    schedule.id
                )));
            }
            s.check_unique_schedule(&schedule)?;
            s.schedules.insert(schedule.id, schedule);
            Ok(())
        })
    }

    async fn get_schedule(&self, id: &Identifier) -> Result<CheckerSchedule, CheckError> {
        self.read(|s| s.schedules.get(id).cloned())
            .ok_or_else(|| CheckError::NotFound(format!("schedule {id}")))
    }

    async fn update_schedule(&self, schedule: CheckerSchedule) -> Result<(), CheckError> {
        schedule.validate()?;
        self.write(|s, _| {
            if !s.schedules.contains_key(&schedule.id) {
                return Err(CheckError::NotFound(format!("schedule {}", schedule.id)));
            }
            s.check_unique_schedule(&schedule)?;
            s.schedules.insert(schedule.id, schedule);
            Ok(())
        })
    }

    async fn delete_schedule(&self, id: &Identifier) -> Result<(), CheckError> {
        self.write(|s, _| {
            s.schedules
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| CheckError::NotFound(format!("schedule {id}")))
        })
    }

    async fn list_by_owner(&self, owner_id: &Identifier) -> Result<Vec<CheckerSchedule>, CheckError> {
        let mut schedules = self.read(|s| {
            s.schedules
                .values()
                .filter(|sch| &sch.owner_id == owner_id)
                .cloned()
                .collect::<Vec<_>>()
        });
        sort_by_next_run(&mut schedules);
        Ok(schedules)
    }

    async fn list_by_target(&self, scope: &CheckScope) -> Result<Vec<CheckerSchedule>, CheckError> {
        let mut schedules = self.read(|s| {
            s.schedules
                .values()
                .filter(|sch| &sch.scope == scope)
                .cloned()
                .collect::<Vec<_>>()
        });
        sort_by_next_run(&mut schedules);
        Ok(schedules)
    }

    async fn list_due(&self, now_ms: u128) -> Result<Vec<CheckerSchedule>, CheckError> {
        let mut schedules = self.read(|s| {
            s.schedules
                .values()
                .filter(|sch| sch.is_due(now_ms))
                .cloned()
                .collect::<Vec<_>>()
        });
        sort_by_next_run(&mut schedules);
        Ok(schedules)
    }

    async fn list_enabled(&self) -> Result<Vec<CheckerSchedule>, CheckError> {
        let mut schedules = self.read(|s| {
            s.schedules
                .values()
                .filter(|sch| sch.enabled)
                .cloned()
                .collect::<Vec<_>>()
        });
        sort_by_next_run(&mut schedules);
        Ok(schedules)
    }

    async fn delete_schedules_by_owner(&self, owner_id: &Identifier) -> Result<usize, CheckError> {
        self.write(|s, _| {
            let before = s.schedules.len();
            s.schedules.retain(|_, sch| &sch.owner_id != owner_id);
            Ok(before - s.schedules.len())
        })
    }

    async fn delete_schedules_for_domain(
        &self,
        domain_id: &Identifier,
    ) -> Result<usize, CheckError> {
        self.write(|s, _| {
            let before = s.schedules.len();
            s.schedules.retain(|_, sch| sch.scope.domain_id() != Some(domain_id));
            Ok(before - s.schedules.len())
        })
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_execution(&self, execution: CheckExecution) -> Result<(), CheckError> {
        self.write(|s, _| {
            if s.executions.contains_key(&execution.id) {
                return Err(CheckError::Validation(format!(
                    "execution {} already exists",
                    execution.id
                )));
            }
            s.index_execution(&execution);
            s.executions.insert(execution.id, execution);
            Ok(())
        })
    }

    async fn admit_execution(
        &self,
        execution: CheckExecution,
        ttl: Duration,
    ) -> Result<Admission, CheckError> {
        let ttl_ms = ttl.as_millis();
        let now = execution.started_at_ms;
        self.write(|s, _| {
            if s.executions.contains_key(&execution.id) {
                return Err(CheckError::Validation(format!(
                    "execution {} already exists",
                    execution.id
                )));
            }
            let key = tuple_key(&execution.checker_name, &execution.scope);
            let mut abandoned = Vec::new();
            while let Some(existing) = s.inflight.get(&key).and_then(|id| s.executions.get(id)) {
                if existing.started_at_ms + ttl_ms >= now {
                    return Ok(Admission::Joined(existing.clone()));
                }
                let swept = existing.finished(
                    ExecutionState::Failed,
                    Some(reasons::ABANDONED.to_string()),
                    now,
                );
                s.replace_execution(swept.clone());
                abandoned.push(swept);
            }
            s.index_execution(&execution);
            s.executions.insert(execution.id, execution.clone());
            if abandoned.is_empty() {
                Ok(Admission::Created(execution))
            } else {
                Ok(Admission::Replaced {
                    created: execution,
                    abandoned,
                })
            }
        })
    }

    async fn update_execution(&self, execution: CheckExecution) -> Result<(), CheckError> {
        self.write(|s, _| {
            s.check_mutable(&execution.id)?;
            s.replace_execution(execution);
            Ok(())
        })
    }

    async fn finish_execution(
        &self,
        execution: CheckExecution,
        result: Option<CheckResult>,
    ) -> Result<(), CheckError> {
        if !execution.state.is_terminal() {
            return Err(CheckError::IllegalTransition(format!(
                "cannot finish execution {} in state {}",
                execution.id, execution.state
            )));
        }
        if let Some(result) = &result {
            if result.execution_id != execution.id {
                return Err(CheckError::Validation(format!(
                    "result {} does not belong to execution {}",
                    result.id, execution.id
                )));
            }
        }
        self.write(|s, cap| {
            s.check_mutable(&execution.id)?;
            s.replace_execution(execution);
            if let Some(result) = result {
                s.insert_result(result, cap);
            }
            Ok(())
        })
    }

    async fn get_execution(&self, id: &Identifier) -> Result<CheckExecution, CheckError> {
        self.read(|s| s.executions.get(id).cloned())
            .ok_or_else(|| CheckError::NotFound(format!("execution {id}")))
    }

    async fn list_inflight(&self) -> Result<Vec<CheckExecution>, CheckError> {
        let mut executions = self.read(|s| {
            s.executions
                .values()
                .filter(|e| !e.state.is_terminal())
                .cloned()
                .collect::<Vec<_>>()
        });
        executions.sort_by(|a, b| a.started_at_ms.cmp(&b.started_at_ms).then(a.id.cmp(&b.id)));
        Ok(executions)
    }

    async fn list_executions(
        &self,
        checker_name: &str,
        scope: &CheckScope,
        limit: usize,
    ) -> Result<Vec<CheckExecution>, CheckError> {
        let mut executions = self.read(|s| {
            s.executions
                .values()
                .filter(|e| e.same_target(checker_name, scope))
                .cloned()
                .collect::<Vec<_>>()
        });
        executions.sort_by(|a, b| b.started_at_ms.cmp(&a.started_at_ms).then(b.id.cmp(&a.id)));
        executions.truncate(limit);
        Ok(executions)
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    fn set_results_per_tuple(&self, cap: usize) {
        self.results_per_tuple.store(cap.max(1), Ordering::Relaxed);
    }

    async fn append_result(&self, result: CheckResult) -> Result<(), CheckError> {
        self.write(|s, cap| {
            let execution = s
                .executions
                .get(&result.execution_id)
                .ok_or_else(|| CheckError::NotFound(format!("execution {}", result.execution_id)))?;
            if !execution.state.is_terminal() {
                return Err(CheckError::IllegalTransition(format!(
                    "execution {} is still {}",
                    execution.id, execution.state
                )));
            }
            if s.results.contains_key(&result.id) {
                return Err(CheckError::Validation(format!("result {} already exists", result.id)));
            }
            s.insert_result(result, cap);
            Ok(())
        })
    }

    async fn list_results(
        &self,
        checker_name: &str,
        scope: &CheckScope,
        limit: usize,
    ) -> Result<Vec<CheckResult>, CheckError> {
        Ok(self.read(|s| {
            s.results_by_tuple
                .get(&tuple_key(checker_name, scope))
                .map(|ordered| {
                    ordered
                        .iter()
                        .rev()
                        .take(limit)
                        .filter_map(|(_, id)| s.results.get(id).cloned())
                        .collect()
                })
                .unwrap_or_default()
        }))
    }

    async fn get_result(&self, id: &Identifier) -> Result<CheckResult, CheckError> {
        self.read(|s| s.results.get(id).cloned())
            .ok_or_else(|| CheckError::NotFound(format!("result {id}")))
    }

    async fn delete_result(&self, id: &Identifier) -> Result<(), CheckError> {
        self.write(|s, _| {
            s.remove_result(id)
                .map(|_| ())
                .ok_or_else(|| CheckError::NotFound(format!("result {id}")))
        })
    }

    async fn delete_all_results(
        &self,
        checker_name: &str,
        scope: &CheckScope,
    ) -> Result<usize, CheckError> {
        self.write(|s, _| {
            let ids: Vec<Identifier> = s
                .results_by_tuple
                .get(&tuple_key(checker_name, scope))
                .map(|ordered| ordered.iter().map(|(_, id)| *id).collect())
                .unwrap_or_default();
            for id in &ids {
                s.remove_result(id);
            }
            Ok(ids.len())
        })
    }

    async fn delete_results_for_domain(&self, domain_id: &Identifier) -> Result<usize, CheckError> {
        self.write(|s, _| {
            let ids: Vec<Identifier> = s
                .results
                .values()
                .filter(|r| r.scope.domain_id() == Some(domain_id))
                .map(|r| r.id)
                .collect();
            for id in &ids {
                s.remove_result(id);
            }
            Ok(ids.len())
        })
    }
}
