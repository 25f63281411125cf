//! Check scheduler.
//!
//! One instance per process. [`Scheduler::start`] spawns `workers` dedicated OS
//! threads, each with its own single-threaded tokio runtime, plus a tick loop
//! on the caller's runtime. Both producers (the tick loop and on-demand
//! triggers) feed a bounded crossbeam channel that the workers drain.
//!
//! # Lifecycle
//!
//! - `start`: sweeps abandoned executions, freezes the registry, spawns
//!   workers and the tick loop. Every tick repeats the sweep, so an execution
//!   that never reaches a worker stops blocking its target once the TTL runs
//!   out.
//! - `stop`: signals the tick loop and the workers, drops the dispatch sender
//!   and joins everything within `drain_timeout`. Executions dequeued after
//!   `stop` began are cancelled instead of run.
//!
//! Dropping a started scheduler signals shutdown but does not join.

mod worker;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::util::Clock;

use super::{
    Admission, CheckError, CheckExecution, CheckScope, CheckStore, CheckerOptions,
    CheckerRegistry, CheckerSchedule, ExecutionState, Identifier, OptionResolver, TriggeredBy,
};

/// Error messages recorded on executions the scheduler terminates itself.
pub mod reasons {
    /// Swept after exceeding the execution TTL.
    pub const ABANDONED: &str = "abandoned";
    /// Plugin exceeded its deadline.
    pub const TIMEOUT: &str = "timeout";
    /// Tick could not enqueue the execution.
    pub const QUEUE_FULL: &str = "queue_full";
    /// On-demand trigger could not enqueue the execution in time.
    pub const QUEUE_TIMEOUT: &str = "queue_timeout";
    /// Dequeued or interrupted while the scheduler was stopping.
    pub const SCHEDULER_STOPPED: &str = "scheduler_stopped";
}

/// Unit of work handed to the workers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dispatch {
    pub execution_id: Identifier,
}

/// Lock-free scheduler counters.
#[derive(Debug, Default)]
pub(crate) struct SchedulerCounters {
    pub enqueued: AtomicU64,
    pub coalesced: AtomicU64,
    pub dropped_scheduled: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub timed_out: AtomicU64,
    pub cancelled: AtomicU64,
    pub abandoned: AtomicU64,
}

impl SchedulerCounters {
    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            dropped_scheduled: self.dropped_scheduled.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of the scheduler counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Executions handed to the dispatch queue.
    pub enqueued: u64,
    /// Triggers and ticks that joined an in-flight execution.
    pub coalesced: u64,
    /// Scheduled runs dropped because the queue was full.
    pub dropped_scheduled: u64,
    /// Executions that ended `succeeded`.
    pub succeeded: u64,
    /// Executions that ended `failed`, timeouts included.
    pub failed: u64,
    /// Plugin runs that hit the per-run deadline.
    pub timed_out: u64,
    /// Executions cancelled by the scheduler.
    pub cancelled: u64,
    /// Executions swept as abandoned after exceeding the TTL.
    pub abandoned: u64,
}

/// Scheduler status projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Runtime enable flag.
    pub enabled: bool,
    /// Whether `start` has run and `stop` has not.
    pub running: bool,
    /// Worker pool size.
    pub workers: usize,
    /// Executions waiting in the dispatch queue.
    pub queue_depth: usize,
    /// Dispatch queue capacity.
    pub queue_capacity: usize,
    /// Next enabled schedules by `next_run`.
    pub next_schedules: Vec<CheckerSchedule>,
    /// Counters.
    pub stats: SchedulerStats,
}

/// Outcome of one due-schedule scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// The scan was skipped because the scheduler is disabled.
    pub skipped: bool,
    /// In-flight executions past the TTL swept before the scan.
    pub abandoned: usize,
    /// Due schedules found.
    pub due: usize,
    /// Executions created and enqueued.
    pub enqueued: usize,
    /// Due schedules that joined an in-flight execution.
    pub coalesced: usize,
    /// Due schedules dropped on a full queue.
    pub dropped: usize,
    /// Due schedules left untouched after a storage failure.
    pub errors: usize,
}

/// State shared by the scheduler handle, the tick loop and the workers.
pub(crate) struct Shared {
    pub config: SchedulerConfig,
    pub store: Arc<dyn CheckStore>,
    pub registry: Arc<CheckerRegistry>,
    pub resolver: OptionResolver,
    pub clock: Arc<dyn Clock>,
    pub counters: SchedulerCounters,
    pub enabled: AtomicBool,
    pub stopping: AtomicBool,
    sender: RwLock<Option<Sender<Dispatch>>>,
    rng: Mutex<StdRng>,
}

impl Shared {
    fn sender(&self) -> Option<Sender<Dispatch>> {
        self.sender.read().clone()
    }

    /// Move a non-terminal execution to `state` with `reason`, no result.
    pub async fn terminate(&self, execution: &CheckExecution, state: ExecutionState, reason: &str) {
        let finished = execution.finished(state, Some(reason.to_string()), self.clock.now_ms());
        match self.store.finish_execution(finished, None).await {
            Ok(()) => {
                let counter = match state {
                    ExecutionState::Cancelled => &self.counters.cancelled,
                    _ => &self.counters.failed,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                debug!(execution_id = %execution.id, %state, reason, "execution terminated");
            }
            Err(CheckError::IllegalTransition(_)) => {
                debug!(execution_id = %execution.id, "execution already terminal");
            }
            Err(e) => {
                error!(execution_id = %execution.id, error = %e, "failed to terminate execution");
            }
        }
    }

    fn note_abandoned(&self, admission: &Admission) {
        let Admission::Replaced { created, abandoned } = admission else {
            return;
        };
        for execution in abandoned {
            warn!(
                execution_id = %execution.id,
                replaced_by = %created.id,
                checker = %execution.checker_name,
                "replaced expired in-flight execution"
            );
        }
        self.counters
            .abandoned
            .fetch_add(abandoned.len() as u64, Ordering::Relaxed);
    }

    async fn tick(&self) -> Result<TickReport, CheckError> {
        let Some(sender) = self.sender() else {
            return Err(CheckError::NotRunning);
        };
        let mut report = TickReport::default();
        match self.recover_abandoned().await {
            Ok(swept) => report.abandoned = swept,
            Err(e) => error!(error = %e, "failed to sweep expired executions"),
        }
        if !self.enabled.load(Ordering::Acquire) {
            report.skipped = true;
            return Ok(report);
        }

        let now = self.clock.now_ms();
        let due = self.store.list_due(now).await?;
        report.due = due.len();
        let ttl = self.config.execution_ttl();

        for schedule in due {
            let execution = CheckExecution::pending(
                schedule.checker_name.clone(),
                schedule.scope,
                Some(schedule.owner_id),
                TriggeredBy::Schedule(schedule.id),
                schedule.options.clone().unwrap_or_default(),
                now,
            );
            let admission = match self.store.admit_execution(execution, ttl).await {
                Ok(admission) => admission,
                Err(e) => {
                    error!(schedule_id = %schedule.id, error = %e, "failed to create scheduled execution");
                    report.errors += 1;
                    continue;
                }
            };

            self.note_abandoned(&admission);
            match admission {
                Admission::Joined(existing) => {
                    self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        schedule_id = %schedule.id,
                        execution_id = %existing.id,
                        "scheduled run joined in-flight execution"
                    );
                    report.coalesced += 1;
                }
                Admission::Created(created) | Admission::Replaced { created, .. } => {
                    match sender.try_send(Dispatch {
                        execution_id: created.id,
                    }) {
                        Ok(()) => {
                            self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                            report.enqueued += 1;
                        }
                        Err(TrySendError::Full(_)) => {
                            self.counters.dropped_scheduled.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                schedule_id = %schedule.id,
                                checker = %schedule.checker_name,
                                "dispatch queue full, dropping scheduled run"
                            );
                            self.terminate(&created, ExecutionState::Cancelled, reasons::QUEUE_FULL)
                                .await;
                            report.dropped += 1;
                            continue;
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            self.terminate(
                                &created,
                                ExecutionState::Cancelled,
                                reasons::SCHEDULER_STOPPED,
                            )
                            .await;
                            return Err(CheckError::NotRunning);
                        }
                    }
                }
            }

            if let Err(e) = self.advance(&schedule.id, now).await {
                error!(schedule_id = %schedule.id, error = %e, "failed to advance schedule");
                report.errors += 1;
            }
        }

        Ok(report)
    }

    /// Persist `next_run = now + interval` on the latest copy of a schedule.
    async fn advance(&self, schedule_id: &Identifier, now: u128) -> Result<(), CheckError> {
        let mut schedule = match self.store.get_schedule(schedule_id).await {
            Ok(schedule) => schedule,
            Err(CheckError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        schedule.last_run_ms = Some(now);
        schedule.next_run_ms = now + schedule.interval_ms();
        self.store.update_schedule(schedule).await
    }

    /// Fail in-flight executions whose `started_at + execution_ttl` is in the
    /// past. Runs at startup and at the head of every tick.
    async fn recover_abandoned(&self) -> Result<usize, CheckError> {
        let now = self.clock.now_ms();
        let ttl = self.config.execution_ttl().as_millis();
        let mut swept = 0;
        for execution in self.store.list_inflight().await? {
            if execution.started_at_ms + ttl >= now {
                continue;
            }
            let finished =
                execution.finished(ExecutionState::Failed, Some(reasons::ABANDONED.to_string()), now);
            match self.store.finish_execution(finished, None).await {
                Ok(()) => {
                    warn!(
                        execution_id = %execution.id,
                        checker = %execution.checker_name,
                        "marked abandoned execution as failed"
                    );
                    swept += 1;
                }
                Err(CheckError::IllegalTransition(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.counters.abandoned.fetch_add(swept as u64, Ordering::Relaxed);
        Ok(swept)
    }
}

/// Handles owned by a started scheduler.
struct Running {
    shutdown: watch::Sender<bool>,
    tick_loop: tokio::task::JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

/// The check scheduler.
pub struct Scheduler {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
    starting: AtomicBool,
}

impl Scheduler {
    /// Create a stopped scheduler.
    ///
    /// # Errors
    ///
    /// `Validation` if the configuration is invalid.
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn CheckStore>,
        registry: Arc<CheckerRegistry>,
        resolver: OptionResolver,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CheckError> {
        config.validate().map_err(CheckError::Validation)?;
        let rng = config
            .jitter_seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Ok(Self {
            shared: Arc::new(Shared {
                enabled: AtomicBool::new(config.scheduler_enabled),
                config,
                store,
                registry,
                resolver,
                clock,
                counters: SchedulerCounters::default(),
                stopping: AtomicBool::new(false),
                sender: RwLock::new(None),
                rng: Mutex::new(rng),
            }),
            running: Mutex::new(None),
            starting: AtomicBool::new(false),
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Registry the scheduler runs checkers from.
    pub fn registry(&self) -> &Arc<CheckerRegistry> {
        &self.shared.registry
    }

    /// Option resolver used by the workers.
    pub fn resolver(&self) -> &OptionResolver {
        &self.shared.resolver
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<dyn CheckStore> {
        &self.shared.store
    }

    /// Whether `start` has completed and `stop` has not begun.
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Sweep abandoned executions, freeze the registry and spawn the workers
    /// and the tick loop. Calling `start` on a running scheduler is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Storage failures during recovery; `Runtime` if worker threads cannot
    /// be spawned.
    pub async fn start(&self) -> Result<(), CheckError> {
        if self.is_running() || self.starting.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let started = self.spawn_all().await;
        self.starting.store(false, Ordering::Release);
        started
    }

    async fn spawn_all(&self) -> Result<(), CheckError> {
        let shared = &self.shared;
        let swept = shared.recover_abandoned().await?;
        shared.registry.freeze();

        let config = &shared.config;
        let (tx, rx) = bounded::<Dispatch>(config.queue_capacity);
        let (shutdown, shutdown_rx) = watch::channel(false);
        shared.stopping.store(false, Ordering::Release);

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            match worker::spawn_worker(worker_id, rx.clone(), Arc::clone(shared), shutdown_rx.clone())
            {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    error!(worker_id, error = %e, "failed to spawn worker thread");
                    shutdown.send_replace(true);
                    drop(tx);
                    return Err(CheckError::Runtime(format!(
                        "failed to spawn worker {worker_id}: {e}"
                    )));
                }
            }
        }
        *shared.sender.write() = Some(tx);

        let tick_loop = tokio::spawn(tick_loop(Arc::clone(shared), shutdown_rx));
        *self.running.lock() = Some(Running {
            shutdown,
            tick_loop,
            workers,
        });

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            tick_interval_ms = config.tick_interval_ms,
            enabled = shared.enabled.load(Ordering::Acquire),
            abandoned = swept,
            "check scheduler started"
        );
        Ok(())
    }

    /// Signal shutdown and wait up to `drain_timeout` for the tick loop and
    /// the workers. Stopping a stopped scheduler is a no-op.
    ///
    /// # Errors
    ///
    /// `Shutdown` listing every component that failed to stop in time or
    /// panicked.
    pub async fn stop(&self) -> Result<(), CheckError> {
        let Some(running) = self.running.lock().take() else {
            return Ok(());
        };
        let shared = &self.shared;
        info!("stopping check scheduler");

        shared.stopping.store(true, Ordering::Release);
        running.shutdown.send_replace(true);
        *shared.sender.write() = None;

        let deadline = Instant::now() + shared.config.drain_timeout();
        let mut errors = Vec::new();

        match tokio::time::timeout(deadline.saturating_duration_since(Instant::now()), running.tick_loop)
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => errors.push(format!("tick loop failed: {e}")),
            Err(_) => errors.push("tick loop did not stop before the drain timeout".to_string()),
        }

        let workers = running.workers;
        let worker_errors = tokio::task::spawn_blocking(move || join_workers(workers, deadline))
            .await
            .unwrap_or_else(|e| vec![format!("worker join task failed: {e}")]);
        errors.extend(worker_errors);

        if errors.is_empty() {
            info!("check scheduler stopped");
            Ok(())
        } else {
            for e in &errors {
                warn!(error = %e, "check scheduler shutdown issue");
            }
            Err(CheckError::Shutdown(errors))
        }
    }

    /// Toggle the runtime enable flag. Idempotent.
    pub fn set_enabled(&self, enabled: bool) {
        if self.shared.enabled.swap(enabled, Ordering::AcqRel) != enabled {
            info!(enabled, "check scheduler toggled");
        }
    }

    /// Runtime enable flag.
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    /// Counter snapshot.
    pub fn stats(&self) -> SchedulerStats {
        self.shared.counters.snapshot()
    }

    /// Status projection with the next `status_upcoming` enabled schedules.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn status(&self) -> Result<SchedulerStatus, CheckError> {
        let shared = &self.shared;
        let mut next_schedules = shared.store.list_enabled().await?;
        next_schedules.truncate(shared.config.status_upcoming);
        Ok(SchedulerStatus {
            enabled: self.is_enabled(),
            running: self.is_running(),
            workers: shared.config.workers,
            queue_depth: shared.sender().map_or(0, |tx| tx.len()),
            queue_capacity: shared.config.queue_capacity,
            next_schedules,
            stats: shared.counters.snapshot(),
        })
    }

    /// Run one due-schedule scan now.
    ///
    /// # Errors
    ///
    /// `NotRunning` before `start`; storage failures listing due schedules.
    pub async fn tick(&self) -> Result<TickReport, CheckError> {
        self.shared.tick().await
    }

    /// Spread every enabled schedule uniformly over its next interval;
    /// returns how many were moved.
    ///
    /// # Errors
    ///
    /// Storage failures; schedules already updated stay updated.
    pub async fn reschedule_upcoming(&self) -> Result<usize, CheckError> {
        let shared = &self.shared;
        let now = shared.clock.now_ms();
        let mut schedules = shared.store.list_enabled().await?;
        {
            let mut rng = shared.rng.lock();
            for schedule in &mut schedules {
                let span = u64::try_from(schedule.interval_ms()).unwrap_or(u64::MAX);
                schedule.next_run_ms = now + u128::from(rng.random_range(0..=span));
            }
        }

        let count = schedules.len();
        for schedule in schedules {
            shared.store.update_schedule(schedule).await?;
        }
        info!(count, "rescheduled upcoming checks");
        Ok(count)
    }

    /// Queue a run of `checker_name` against `scope` and return the execution
    /// id, or the id of the in-flight execution for the same target.
    ///
    /// # Errors
    ///
    /// - `NotRunning` before `start` or during `stop`
    /// - `SchedulerDisabled` while disabled
    /// - `UnknownChecker` if the checker is not registered
    /// - `Validation` if the checker does not apply to the scope, or for
    ///   undocumented run options in strict mode
    /// - `QueueTimeout` if the queue stayed full for `trigger_enqueue_timeout`
    pub async fn trigger_on_demand(
        &self,
        checker_name: &str,
        scope: CheckScope,
        user_id: Option<Identifier>,
        runtime_options: CheckerOptions,
    ) -> Result<Identifier, CheckError> {
        let shared = &self.shared;
        let Some(sender) = shared.sender() else {
            return Err(CheckError::NotRunning);
        };
        if !self.is_enabled() {
            return Err(CheckError::SchedulerDisabled);
        }
        let checker = shared.registry.get(checker_name)?;
        if !checker.availability().applies_to(scope.kind()) {
            return Err(CheckError::Validation(format!(
                "checker `{checker_name}` does not apply to {} scope",
                scope.kind()
            )));
        }
        shared.resolver.validate_runtime(checker_name, &runtime_options)?;

        let triggered_by = user_id.map_or(TriggeredBy::System, TriggeredBy::User);
        let execution = CheckExecution::pending(
            checker_name,
            scope,
            user_id,
            triggered_by,
            runtime_options,
            shared.clock.now_ms(),
        );
        let admission = shared
            .store
            .admit_execution(execution, shared.config.execution_ttl())
            .await?;
        shared.note_abandoned(&admission);
        let created = match admission {
            Admission::Joined(existing) => {
                shared.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(execution_id = %existing.id, checker = checker_name, "trigger coalesced");
                return Ok(existing.id);
            }
            Admission::Created(created) | Admission::Replaced { created, .. } => created,
        };

        let dispatch = Dispatch {
            execution_id: created.id,
        };
        let timeout = shared.config.trigger_enqueue_timeout();
        let sent = tokio::task::spawn_blocking(move || sender.send_timeout(dispatch, timeout)).await;
        match sent {
            Ok(Ok(())) => {
                shared.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                debug!(execution_id = %created.id, checker = checker_name, "execution queued");
                Ok(created.id)
            }
            Ok(Err(crossbeam_channel::SendTimeoutError::Disconnected(_))) => {
                shared
                    .terminate(&created, ExecutionState::Cancelled, reasons::SCHEDULER_STOPPED)
                    .await;
                Err(CheckError::NotRunning)
            }
            Ok(Err(crossbeam_channel::SendTimeoutError::Timeout(_))) | Err(_) => {
                warn!(execution_id = %created.id, checker = checker_name, "dispatch queue full");
                shared
                    .terminate(&created, ExecutionState::Failed, reasons::QUEUE_TIMEOUT)
                    .await;
                Err(CheckError::QueueTimeout)
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Signal only; joining here could block an async caller.
        if let Some(running) = self.running.get_mut().take() {
            self.shared.stopping.store(true, Ordering::Release);
            running.shutdown.send_replace(true);
            *self.shared.sender.write() = None;
            running.tick_loop.abort();
            debug!("scheduler dropped without stop, workers detached");
        }
    }
}

/// Resolves once shutdown has been signalled.
pub(crate) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn tick_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let period = shared.config.tick_interval();
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(tick_interval_ms = shared.config.tick_interval_ms, "tick loop started");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            () = stopped(&mut shutdown) => break,
        }

        let started = Instant::now();
        match shared.tick().await {
            Ok(report) if report.skipped => debug!("tick skipped, scheduler disabled"),
            Ok(report) => debug!(
                due = report.due,
                enqueued = report.enqueued,
                coalesced = report.coalesced,
                dropped = report.dropped,
                errors = report.errors,
                "tick completed"
            ),
            Err(CheckError::NotRunning) => break,
            Err(e) => error!(error = %e, "tick failed, retrying next interval"),
        }

        let elapsed = started.elapsed();
        if elapsed > period {
            warn!(elapsed = ?elapsed, "tick took longer than the tick interval");
        }
    }

    debug!("tick loop exiting");
}

/// Join worker threads until `deadline`; returns a message per worker that
/// panicked or was still running.
fn join_workers(workers: Vec<JoinHandle<()>>, deadline: Instant) -> Vec<String> {
    let total = workers.len();
    let (tx, rx) = std::sync::mpsc::channel();
    for (worker_id, handle) in workers.into_iter().enumerate() {
        let tx = tx.clone();
        // Joiner threads that outlive the deadline are detached.
        let _ = thread::Builder::new()
            .name(format!("check-joiner-{worker_id}"))
            .spawn(move || {
                let _ = tx.send((worker_id, handle.join().is_ok()));
            });
    }
    drop(tx);

    let mut joined = vec![false; total];
    let mut errors = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining.max(Duration::from_millis(1))) {
            Ok((worker_id, ok)) => {
                joined[worker_id] = true;
                if ok {
                    debug!(worker_id, "worker joined");
                } else {
                    errors.push(format!("worker {worker_id} panicked"));
                }
            }
            Err(_) => break,
        }
    }

    for (worker_id, done) in joined.into_iter().enumerate() {
        if !done {
            errors.push(format!("worker {worker_id} did not exit before the drain timeout"));
        }
    }
    errors
}
