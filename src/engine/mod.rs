//! State machine engine
//!
//! Interprets a [`StateGraph`] against a [`Page`]. Each iteration resolves the
//! current state's target, runs its action, evaluates its check, transitions, and
//! checkpoints. The run ends when a state has nowhere to go, on a fatal error, or
//! after [`StateMachine::stop`].
//!
//! Cancellation is cooperative. The flag is polled after resolving (before any
//! action) and after the checkpoint and throttle that close an iteration, so an
//! action that has started always finishes and is always checkpointed.

mod capability;
mod graph;
mod state;

pub use capability::{
    ActionContext, AutomationContext, Capabilities, ChannelNotifier, CustomAction, LogNotifier, NoopNotifier,
    Predicate, Progress, ProgressNotifier,
};
pub use graph::{ActionSpec, GraphIssue, StateDef, StateGraph};
pub use state::{ContextMap, RunState};

use crate::browser::Page;
use crate::checkpoint::Checkpoint;
use crate::error::{AutomationError, Result};
use crate::executor::{Executor, TimingConfig};
use crate::logging::Logger;
use crate::resolver::{Resolution, Resolver};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const DEFAULT_RUN_KEY: &str = "default";

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// Reached a state with no outgoing transition
    Completed,
    /// Stopped through [`StateMachine::stop`]
    Cancelled,
    /// Fatal error
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    Running,
    Halted(Halt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// Result of a run that did not fail
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub state: RunState,
    /// Completed iterations
    pub iterations: usize,
}

impl RunReport {
    fn new(outcome: RunOutcome, state: RunState, iterations: usize) -> Self {
        Self {
            outcome,
            state,
            iterations,
        }
    }
}

/// Requests cancellation of a running [`StateMachine`] from elsewhere
#[derive(Debug, Clone)]
pub struct StopHandle {
    cancel: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Where an iteration goes next
enum Step {
    To(String),
    Done,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct StateMachine {
    graph: StateGraph,
    page: Arc<dyn Page>,
    context: AutomationContext,
    resolver: Resolver,
    executor: Executor,
    run_key: String,
    logger: Logger,
    status: Mutex<EngineStatus>,
    latest: Mutex<Option<RunState>>,
    cancel: Arc<AtomicBool>,
}

impl StateMachine {
    pub fn new(graph: StateGraph, page: Arc<dyn Page>, context: AutomationContext) -> Self {
        let logger = context.logger.scoped("engine");
        Self {
            resolver: Resolver::new(logger.scoped("resolver")),
            executor: Executor::new(TimingConfig::default(), logger.scoped("executor")),
            graph,
            page,
            context,
            run_key: DEFAULT_RUN_KEY.to_string(),
            logger,
            status: Mutex::new(EngineStatus::Idle),
            latest: Mutex::new(None),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Builder method: key the run's checkpoints are stored under
    pub fn with_run_key(mut self, run_key: impl Into<String>) -> Self {
        self.run_key = run_key.into();
        self
    }

    /// Builder method: delays for actions and the inter-iteration throttle
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.executor = Executor::new(timing, self.logger.scoped("executor"));
        self
    }

    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    pub fn run_key(&self) -> &str {
        &self.run_key
    }

    pub fn status(&self) -> EngineStatus {
        lock(&self.status).clone()
    }

    /// Latest state of the current or last run
    pub fn run_state(&self) -> Option<RunState> {
        lock(&self.latest).clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            cancel: Arc::clone(&self.cancel),
        }
    }

    /// Ask the running loop to exit once the current iteration completes
    pub fn stop(&self) {
        if !self.cancel.swap(true, Ordering::SeqCst) {
            self.logger.info("stop requested");
        }
    }

    /// Last checkpoint for this machine's run key
    pub async fn load_checkpoint(&self) -> Option<Checkpoint> {
        self.context.checkpoints.load(&self.run_key).await
    }

    pub async fn clear_checkpoint(&self) {
        self.context.checkpoints.clear(&self.run_key).await
    }

    /// Run from the initial state with `context` as the accumulator
    pub async fn start(&self, context: ContextMap) -> Result<RunReport> {
        self.start_from(RunState::new(self.graph.initial_state.clone(), context)).await
    }

    /// Run from an explicit state, typically one restored from a [`Checkpoint`]
    pub async fn start_from(&self, state: RunState) -> Result<RunReport> {
        {
            let mut status = lock(&self.status);
            if *status == EngineStatus::Running {
                return Err(AutomationError::AlreadyRunning);
            }
            *status = EngineStatus::Running;
        }
        self.cancel.store(false, Ordering::SeqCst);

        for issue in self.graph.validate() {
            self.logger.warn(format!("graph: {}", issue));
        }
        self.logger
            .info(format!("run '{}' starting at '{}'", self.run_key, state.current));

        let result = self.run_loop(state).await;

        let halt = match &result {
            Ok(report) if report.outcome == RunOutcome::Completed => Halt::Completed,
            Ok(_) => Halt::Cancelled,
            Err(e) => Halt::Failed(e.to_string()),
        };
        match &result {
            Ok(report) => self.logger.info(format!(
                "run '{}' {:?} at '{}' after {} iteration(s)",
                self.run_key, report.outcome, report.state.current, report.iterations
            )),
            Err(e) => self.logger.error(format!("run '{}' halted: {}", self.run_key, e)),
        }
        *lock(&self.status) = EngineStatus::Halted(halt);
        result
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn publish(&self, state: &RunState) {
        *lock(&self.latest) = Some(state.clone());
    }

    async fn run_loop(&self, mut state: RunState) -> Result<RunReport> {
        let mut iterations = 0;
        self.publish(&state);

        loop {
            let def = self
                .graph
                .state(&state.current)
                .ok_or_else(|| AutomationError::InvalidTransition {
                    from: state.history.last().cloned(),
                    to: state.current.clone(),
                })?;

            let step = self.iterate(&state.current.clone(), def, &mut state).await?;
            let Some(step) = step else {
                // stopped between resolving and acting
                return Ok(RunReport::new(RunOutcome::Cancelled, state, iterations));
            };

            let done = match step {
                Step::To(target) => {
                    if !self.graph.contains(&target) {
                        return Err(AutomationError::InvalidTransition {
                            from: Some(state.current.clone()),
                            to: target,
                        });
                    }
                    self.logger.debug(format!("{} -> {}", state.current, target));
                    state.transition_to(target);
                    false
                }
                Step::Done => true,
            };

            iterations += 1;
            self.context.checkpoints.save(&self.run_key, &state).await;
            self.publish(&state);

            if done {
                return Ok(RunReport::new(RunOutcome::Completed, state, iterations));
            }
            if self.cancelled() {
                return Ok(RunReport::new(RunOutcome::Cancelled, state, iterations));
            }

            let throttle = self.executor.timing().throttle;
            self.executor.sleep(throttle.min_ms, Some(throttle.max_ms)).await;
            if self.cancelled() {
                return Ok(RunReport::new(RunOutcome::Cancelled, state, iterations));
            }
        }
    }

    /// One pass over a state; `None` means the run was stopped before the action
    async fn iterate(&self, name: &str, def: &StateDef, state: &mut RunState) -> Result<Option<Step>> {
        let mut resolution = Resolution::None;

        if let Some(spec) = &def.resolve {
            resolution = match self.resolver.resolve(spec, self.page.as_ref()).await {
                Ok(resolution) => resolution,
                Err(e) => {
                    self.logger.warn(format!("'{}': resolution failed: {}", name, e));
                    Resolution::None
                }
            };

            if self.cancelled() {
                return Ok(None);
            }

            if resolution.is_missing() {
                if let Some(target) = &def.on_missing {
                    self.logger.info(format!("'{}': target missing, taking onMissing", name));
                    return Ok(Some(Step::To(target.clone())));
                }
                if !def.optional {
                    return Err(AutomationError::ResolutionMissing { state: name.to_string() });
                }
                self.logger.debug(format!("'{}': optional target missing", name));
            }
        }

        if let Some(action) = &def.action {
            if !self.perform(name, action, &resolution, state).await {
                match &def.fallback {
                    Some(target) => {
                        self.logger.info(format!("'{}': {} failed, taking fallback", name, action.kind()));
                        return Ok(Some(Step::To(target.clone())));
                    }
                    None => self.logger.warn(format!("'{}': {} failed, continuing", name, action.kind())),
                }
            }
        }

        if let Some(predicate_name) = &def.check {
            let predicate = self
                .context
                .capabilities
                .predicate(predicate_name)
                .ok_or_else(|| AutomationError::UnknownCapability {
                    name: predicate_name.clone(),
                })?;

            let verdict = std::panic::catch_unwind(AssertUnwindSafe(|| predicate.evaluate(&mut state.context)))
                .unwrap_or_else(|_| {
                    self.logger.error(format!("'{}': predicate '{}' panicked", name, predicate_name));
                    false
                });
            self.logger.debug(format!("'{}': {} = {}", name, predicate_name, verdict));

            let branch = if verdict { &def.on_true } else { &def.on_false };
            if let Some(target) = branch {
                return Ok(Some(Step::To(target.clone())));
            }
        }

        Ok(Some(match &def.next {
            Some(target) => Step::To(target.clone()),
            None => Step::Done,
        }))
    }

    async fn perform(&self, name: &str, action: &ActionSpec, resolution: &Resolution, state: &mut RunState) -> bool {
        let page = self.page.as_ref();
        let element = resolution.first();

        match action {
            ActionSpec::Click => self.executor.click(page, element).await,
            ActionSpec::Type { text } => self.executor.type_text(page, element, text).await,
            ActionSpec::Scroll => self.executor.scroll_to(page, element).await,
            ActionSpec::Wait { ms, max_ms } => {
                self.executor.sleep(*ms, *max_ms).await;
                true
            }
            ActionSpec::Custom { capability } => {
                let Some(custom) = self.context.capabilities.action(capability) else {
                    self.logger
                        .error(format!("'{}': no custom action registered as '{}'", name, capability));
                    return false;
                };

                let logger = self.logger.scoped(capability);
                let mut ctx = ActionContext {
                    page,
                    data: &mut state.context,
                    notifier: self.context.notifier.as_ref(),
                    logger: &logger,
                };

                match AssertUnwindSafe(custom.execute(resolution, &mut ctx)).catch_unwind().await {
                    Ok(ok) => ok,
                    Err(_) => {
                        self.logger
                            .error(format!("'{}': custom action '{}' panicked", name, capability));
                        false
                    }
                }
            }
        }
    }
}
