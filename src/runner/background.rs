//! The background worker driving the pipeline.
//!
//! # Responsibilities
//! - Run `Pipeline::process` in a loop on a dedicated OS thread
//! - Forward every payload of an iteration through the bridge
//! - Start and stop idempotently under concurrent requests
//!
//! # Design Decisions
//! - `running` and `worker_alive` share one mutex per instance
//! - `stop` only clears the flag; the loop notices at the next iteration boundary
//! - A `start` while the old worker is still winding down re-arms it instead of
//!   spawning a second thread
//! - A failed iteration is logged and the loop continues

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::observability::metrics;
use crate::pipeline::Pipeline;
use crate::runner::bridge::Bridge;
use crate::runner::RunnerError;

/// A pipeline shared by successive runner instances.
pub type SharedPipeline = Arc<Mutex<Box<dyn Pipeline>>>;

#[derive(Debug, Default)]
struct RunnerState {
    running: bool,
    worker_alive: bool,
    started: bool,
}

/// One generation of the background worker.
pub struct BackgroundRunner {
    generation: Uuid,
    state: Mutex<RunnerState>,
    pipeline: SharedPipeline,
    bridge: Bridge,
    config: RunnerConfig,
}

impl BackgroundRunner {
    pub fn new(pipeline: SharedPipeline, bridge: Bridge, config: RunnerConfig) -> Self {
        Self {
            generation: Uuid::new_v4(),
            state: Mutex::new(RunnerState::default()),
            pipeline,
            bridge,
            config,
        }
    }

    /// Begin running. Returns `Ok(false)` if already running.
    ///
    /// Never blocks on the worker.
    pub fn start(self: &Arc<Self>) -> Result<bool, RunnerError> {
        let mut state = self.lock_state();
        if state.running {
            return Ok(false);
        }
        state.running = true;
        state.started = true;

        if state.worker_alive {
            tracing::debug!(generation = %self.generation, "Worker still alive, re-armed");
            return Ok(true);
        }

        let runner = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("autopilot-runner-{}", self.generation.simple()))
            .spawn(move || runner.run_loop());

        match spawned {
            Ok(_) => {
                state.worker_alive = true;
                tracing::info!(generation = %self.generation, topic = %self.config.topic, "Runner started");
                Ok(true)
            }
            Err(e) => {
                state.running = false;
                Err(RunnerError::Spawn(e))
            }
        }
    }

    /// Ask the worker to stop. Returns whether it was running.
    pub fn stop(&self) -> bool {
        let mut state = self.lock_state();
        let was_running = state.running;
        state.running = false;
        if was_running {
            tracing::info!(generation = %self.generation, "Runner stop requested");
        }
        was_running
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().running
    }

    pub fn is_worker_alive(&self) -> bool {
        self.lock_state().worker_alive
    }

    /// Started at least once, now stopped, and the worker thread has exited.
    pub fn has_exited(&self) -> bool {
        let state = self.lock_state();
        state.started && !state.running && !state.worker_alive
    }

    pub fn generation(&self) -> Uuid {
        self.generation
    }

    fn lock_state(&self) -> MutexGuard<'_, RunnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_loop(self: Arc<Self>) {
        let _guard = PanicGuard { runner: &self };
        let interval = Duration::from_millis(self.config.iteration_interval_ms);

        loop {
            {
                let mut state = self.lock_state();
                if !state.running {
                    state.worker_alive = false;
                    break;
                }
            }

            self.iterate();

            if !interval.is_zero() {
                thread::sleep(interval);
            }
        }

        tracing::info!(generation = %self.generation, "Runner worker exited");
    }

    fn iterate(&self) {
        let result = {
            let mut pipeline = self.pipeline.lock().unwrap_or_else(PoisonError::into_inner);
            pipeline.process()
        };

        match result {
            Ok(output) => {
                metrics::record_iteration("ok");
                for payload in output {
                    let message = json!({
                        "event": "pipeline_result",
                        "name": payload.name,
                        "data": payload.data,
                    });
                    self.bridge.publish(self.config.topic.as_str(), message.to_string());
                }
            }
            Err(e) => {
                metrics::record_iteration("error");
                tracing::warn!(generation = %self.generation, error = %e, "Pipeline iteration failed");
            }
        }
    }
}

impl std::fmt::Debug for BackgroundRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRunner")
            .field("generation", &self.generation)
            .field("state", &*self.lock_state())
            .field("topic", &self.config.topic)
            .finish()
    }
}

/// Marks the worker dead if the loop unwinds.
struct PanicGuard<'a> {
    runner: &'a BackgroundRunner,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            let mut state = self.runner.lock_state();
            state.running = false;
            state.worker_alive = false;
            tracing::error!(generation = %self.runner.generation, "Runner worker panicked");
        }
    }
}
