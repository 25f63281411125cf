//! Worker threads draining the dispatch queue.
//!
//! Each worker is a dedicated OS thread with its own current-thread tokio
//! runtime, so plugin work never blocks the caller's runtime. Workers block on
//! `recv` and exit once every sender is gone.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{debug, error, warn};

use super::{reasons, stopped, Dispatch, Shared};
use crate::core::{
    AppResult, CancelSignal, CheckError, CheckExecution, CheckOutcome, CheckResult,
    ExecutionState, RunContext,
};

/// How a plugin run ended.
enum RunEnd {
    Completed(CheckOutcome),
    Failed(CheckError),
    TimedOut,
    Stopped,
}

pub(super) fn spawn_worker(
    worker_id: usize,
    rx: Receiver<Dispatch>,
    shared: Arc<Shared>,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("check-worker-{worker_id}"))
        .spawn(move || {
            debug!(worker_id, "worker thread started");

            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(worker_id, error = %e, "failed to create worker runtime");
                    return;
                }
            };

            // recv fails once the scheduler drops the sender and the queue is drained
            while let Ok(dispatch) = rx.recv() {
                rt.block_on(process(&shared, worker_id, dispatch, shutdown.clone()));
            }

            debug!(worker_id, "worker thread exiting");
        })
}

async fn process(
    shared: &Shared,
    worker_id: usize,
    dispatch: Dispatch,
    shutdown: watch::Receiver<bool>,
) {
    let id = dispatch.execution_id;
    let execution = match shared.store.get_execution(&id).await {
        Ok(execution) => execution,
        Err(e) => {
            error!(worker_id, execution_id = %id, error = %e, "failed to load execution");
            return;
        }
    };
    if execution.state.is_terminal() {
        debug!(worker_id, execution_id = %id, state = %execution.state, "skipping terminal execution");
        return;
    }
    if shared.stopping.load(Ordering::Acquire) {
        shared
            .terminate(&execution, ExecutionState::Cancelled, reasons::SCHEDULER_STOPPED)
            .await;
        return;
    }

    let running = execution.running();
    match shared.store.update_execution(running.clone()).await {
        Ok(()) => {}
        Err(CheckError::IllegalTransition(_)) => {
            debug!(worker_id, execution_id = %id, "execution finished elsewhere, skipping");
            return;
        }
        Err(e) => {
            error!(worker_id, execution_id = %id, error = %e, "failed to mark execution running");
            return;
        }
    }
    debug!(worker_id, execution_id = %id, checker = %running.checker_name, "execution started");

    match run_checker(shared, &running, shutdown).await {
        RunEnd::Completed(outcome) => {
            let now = shared.clock.now_ms();
            let state = outcome.verdict.execution_state();
            let result = CheckResult::for_execution(&running, outcome.verdict, outcome.report, now);
            let finished = running.finished(state, None, now);
            match shared.store.finish_execution(finished, Some(result)).await {
                Ok(()) => {
                    let counter = if state == ExecutionState::Succeeded {
                        &shared.counters.succeeded
                    } else {
                        &shared.counters.failed
                    };
                    counter.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        worker_id,
                        execution_id = %id,
                        verdict = %outcome.verdict,
                        "execution finished"
                    );
                }
                Err(CheckError::IllegalTransition(_)) => {
                    warn!(worker_id, execution_id = %id, "execution swept before its result was recorded");
                }
                Err(e) => {
                    error!(worker_id, execution_id = %id, error = %e, "failed to record result");
                }
            }
        }
        RunEnd::Failed(err) => {
            warn!(worker_id, execution_id = %id, error = %err, "checker failed");
            shared
                .terminate(&running, ExecutionState::Failed, &err.to_string())
                .await;
        }
        RunEnd::TimedOut => {
            shared.counters.timed_out.fetch_add(1, Ordering::Relaxed);
            let err = CheckError::PluginTimeout(format!(
                "{} exceeded {:?}",
                running.checker_name,
                shared.config.per_run_timeout()
            ));
            warn!(worker_id, execution_id = %id, error = %err, "checker exceeded its deadline");
            shared
                .terminate(&running, ExecutionState::Failed, reasons::TIMEOUT)
                .await;
        }
        RunEnd::Stopped => {
            shared
                .terminate(&running, ExecutionState::Cancelled, reasons::SCHEDULER_STOPPED)
                .await;
        }
    }
}

/// Resolve options and run the plugin under the per-run deadline.
async fn run_checker(
    shared: &Shared,
    execution: &CheckExecution,
    mut shutdown: watch::Receiver<bool>,
) -> RunEnd {
    let checker = match shared.registry.get(&execution.checker_name) {
        Ok(checker) => checker,
        Err(e) => return RunEnd::Failed(e),
    };
    let options = match shared
        .resolver
        .build_merged(
            &execution.checker_name,
            execution.owner_id.as_ref(),
            &execution.scope,
            &execution.runtime_options,
        )
        .await
    {
        Ok(options) => options,
        Err(e) => return RunEnd::Failed(e),
    };

    let cancel = CancelSignal::new();
    let ctx = RunContext {
        execution_id: execution.id,
        checker_name: execution.checker_name.clone(),
        scope: execution.scope,
        owner_id: execution.owner_id,
        cancel: cancel.clone(),
    };
    let mut handle = tokio::spawn(async move { checker.run(options, ctx).await });

    let interrupted = tokio::select! {
        joined = &mut handle => return completed(joined),
        () = tokio::time::sleep(shared.config.per_run_timeout()) => RunEnd::TimedOut,
        () = stopped(&mut shutdown) => RunEnd::Stopped,
    };

    cancel.cancel();
    if tokio::time::timeout(shared.config.cancel_grace(), &mut handle)
        .await
        .is_err()
    {
        warn!(
            execution_id = %execution.id,
            checker = %execution.checker_name,
            "checker ignored cancellation, leaving it detached"
        );
    }
    interrupted
}

fn completed(joined: Result<AppResult<CheckOutcome>, JoinError>) -> RunEnd {
    match joined {
        Ok(Ok(outcome)) => RunEnd::Completed(outcome),
        Ok(Err(e)) => RunEnd::Failed(CheckError::PluginError(format!("{e:#}"))),
        Err(e) if e.is_panic() => RunEnd::Failed(CheckError::PluginError("checker panicked".into())),
        Err(e) => RunEnd::Failed(CheckError::PluginError(e.to_string())),
    }
}
