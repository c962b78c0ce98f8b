//! Pipeline runner
//!
//! Executes a [`TaskGraph`] stage by stage. Tasks within a stage run
//! concurrently up to `max_concurrency`; a task never starts before every
//! upstream task has succeeded. The first failure stops further launches.

use super::graph::TaskGraph;
use super::task::{TaskError, TaskResult, TaskSpec, TaskState};
use super::template;
use crate::agent::{Invocation, PreparedCall};
use crate::backend::ContextBlock;
use crate::capability::ProviderFailure;
use crate::config::RunnerSettings;
use crate::error::ApiError;
use crate::schema;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Tasks of one stage run in chunks of at most this many.
    pub max_concurrency: usize,
    /// Applied to tasks without their own `timeout_secs`.
    pub task_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            task_timeout: Duration::from_secs(300),
        }
    }
}

impl From<&RunnerSettings> for RunnerConfig {
    fn from(settings: &RunnerSettings) -> Self {
        Self {
            max_concurrency: settings.max_concurrency.max(1),
            task_timeout: Duration::from_secs(settings.task_timeout_secs),
        }
    }
}

/// Task lifecycle callbacks. Observers may do I/O; the runner does none.
pub trait RunObserver: Send + Sync {
    fn task_started(&self, _task: &TaskSpec) {}
    fn task_finished(&self, _result: &TaskResult) {}
    fn run_finished(&self, _result: &PipelineResult) {}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed { task: String, cause: TaskError },
    Cancelled,
}

/// Outcome of one run: overall status plus one result per task, in
/// execution order. Tasks never started are `Pending`.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub status: RunStatus,
    pub results: Vec<TaskResult>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn result(&self, task: &str) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.task == task)
    }

    pub fn structured(&self, task: &str) -> Option<&Value> {
        self.result(task).and_then(|r| r.structured.as_ref())
    }

    pub fn raw(&self, task: &str) -> Option<&str> {
        self.result(task).and_then(|r| r.raw_output.as_deref())
    }

    /// Tolerated provider failures, tagged with the task that hit them.
    pub fn warnings(&self) -> Vec<(&str, &ProviderFailure)> {
        self.results
            .iter()
            .flat_map(|r| r.warnings.iter().map(move |w| (r.task.as_str(), w)))
            .collect()
    }

    pub fn count(&self, state: TaskState) -> usize {
        self.results.iter().filter(|r| r.state == state).count()
    }

    pub fn into_result(self) -> Result<PipelineResult, ApiError> {
        match &self.status {
            RunStatus::Succeeded => Ok(self),
            RunStatus::Failed { task, cause } => Err(ApiError::TaskFailure {
                task: task.clone(),
                cause: cause.clone(),
            }),
            RunStatus::Cancelled => Err(ApiError::Cancelled),
        }
    }
}

pub struct PipelineRunner {
    config: RunnerConfig,
    cancel: CancellationToken,
    observers: Vec<Arc<dyn RunObserver>>,
}

impl PipelineRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            observers: Vec::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every task of `graph` against `inputs`.
    ///
    /// Unresolvable placeholders are a configuration error raised before any
    /// task starts. Task failures and cancellation are reported through the
    /// returned [`PipelineResult`], not as `Err`.
    pub async fn run(
        &self,
        graph: &TaskGraph,
        inputs: &BTreeMap<String, String>,
    ) -> Result<PipelineResult, ApiError> {
        let missing = graph
            .plan()
            .missing_inputs(inputs.keys().map(String::as_str));
        if !missing.is_empty() {
            let listed: Vec<String> = missing
                .iter()
                .map(|(task, name)| format!("{{{}}} in task '{}'", name, task))
                .collect();
            return Err(ApiError::ConfigError(format!(
                "Unresolved placeholders: {}",
                listed.join(", ")
            )));
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let mut finished: HashMap<String, TaskResult> = HashMap::new();
        let mut status = RunStatus::Succeeded;
        let width = self.config.max_concurrency.max(1);

        info!(tasks = graph.plan().len(), max_concurrency = width, "Pipeline run started");

        'stages: for stage in graph.stages() {
            for chunk in stage.chunks(width) {
                if self.cancel.is_cancelled() {
                    info!("Pipeline run cancelled; no further tasks will start");
                    status = RunStatus::Cancelled;
                    break 'stages;
                }
                let outputs = &finished;
                let results =
                    join_all(chunk.iter().map(|spec| self.execute_task(graph, spec, inputs, outputs)))
                        .await;

                let mut failure = None;
                for result in results {
                    if failure.is_none() {
                        if let Some(error) = &result.error {
                            failure = Some(RunStatus::Failed {
                                task: result.task.clone(),
                                cause: error.clone(),
                            });
                        }
                    }
                    finished.insert(result.task.clone(), result);
                }
                if let Some(failed) = failure {
                    status = failed;
                    break 'stages;
                }
            }
        }

        let results = graph
            .order()
            .into_iter()
            .map(|spec| {
                finished
                    .remove(&spec.name)
                    .unwrap_or_else(|| TaskResult::pending(&spec.name))
            })
            .collect();

        let result = PipelineResult {
            status,
            results,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        match &result.status {
            RunStatus::Succeeded => info!(duration_ms = result.duration_ms, "Pipeline run succeeded"),
            RunStatus::Failed { task, cause } => warn!(
                task = %task,
                duration_ms = result.duration_ms,
                skipped = result.count(TaskState::Pending),
                "Pipeline run failed: {}",
                cause
            ),
            RunStatus::Cancelled => warn!(
                duration_ms = result.duration_ms,
                skipped = result.count(TaskState::Pending),
                "Pipeline run cancelled"
            ),
        }
        for observer in &self.observers {
            observer.run_finished(&result);
        }
        Ok(result)
    }

    async fn execute_task(
        &self,
        graph: &TaskGraph,
        spec: &TaskSpec,
        inputs: &BTreeMap<String, String>,
        outputs: &HashMap<String, TaskResult>,
    ) -> TaskResult {
        for observer in &self.observers {
            observer.task_started(spec);
        }
        let started_at = Utc::now();
        let start = Instant::now();
        let elapsed = |start: Instant| start.elapsed().as_millis() as u64;

        info!(task = %spec.name, agent = %spec.agent, "Task started");

        let result = match self.prepare(spec, inputs, outputs) {
            Err(error) => TaskResult::failed(&spec.name, error, None, started_at, elapsed(start)),
            Ok(invocation) => {
                let secs = spec
                    .timeout_secs
                    .unwrap_or_else(|| self.config.task_timeout.as_secs());
                match graph.agent_for(spec) {
                    None => TaskResult::failed(
                        &spec.name,
                        TaskError::Template(format!("agent '{}' is not bound", spec.agent)),
                        None,
                        started_at,
                        elapsed(start),
                    ),
                    Some(agent) => {
                        let outcome = tokio::time::timeout(
                            Duration::from_secs(secs),
                            agent.execute(invocation),
                        )
                        .await;
                        match outcome {
                            Err(_) => TaskResult::failed(
                                &spec.name,
                                TaskError::Timeout { secs },
                                None,
                                started_at,
                                elapsed(start),
                            ),
                            Ok(Err(error)) => {
                                TaskResult::failed(&spec.name, error, None, started_at, elapsed(start))
                            }
                            Ok(Ok(output)) => match &spec.output_schema {
                                None => TaskResult::succeeded(
                                    &spec.name,
                                    output.raw,
                                    None,
                                    output.warnings,
                                    started_at,
                                    elapsed(start),
                                ),
                                Some(output_schema) => {
                                    match schema::validate(&output.raw, output_schema) {
                                        Ok(value) => TaskResult::succeeded(
                                            &spec.name,
                                            output.raw,
                                            Some(value),
                                            output.warnings,
                                            started_at,
                                            elapsed(start),
                                        ),
                                        Err(error) => TaskResult::failed(
                                            &spec.name,
                                            TaskError::Schema(error),
                                            Some(output.raw),
                                            started_at,
                                            elapsed(start),
                                        ),
                                    }
                                }
                            },
                        }
                    }
                }
            }
        };

        match &result.error {
            None => info!(
                task = %spec.name,
                agent = %spec.agent,
                duration_ms = result.duration_ms,
                warnings = result.warnings.len(),
                "Task succeeded"
            ),
            Some(error) => warn!(
                task = %spec.name,
                agent = %spec.agent,
                duration_ms = result.duration_ms,
                "Task failed: {}",
                error
            ),
        }
        for observer in &self.observers {
            observer.task_finished(&result);
        }
        result
    }

    /// Render templates and gather upstream outputs, in upstream declaration order.
    fn prepare(
        &self,
        spec: &TaskSpec,
        inputs: &BTreeMap<String, String>,
        outputs: &HashMap<String, TaskResult>,
    ) -> Result<Invocation, TaskError> {
        let prompt = template::render(&spec.prompt, inputs).map_err(TaskError::Template)?;

        let mut calls = Vec::with_capacity(spec.capability_calls.len());
        for call in &spec.capability_calls {
            calls.push(PreparedCall {
                capability: call.capability.clone(),
                argument: template::render(&call.argument, inputs).map_err(TaskError::Template)?,
                secondary: call
                    .secondary
                    .as_deref()
                    .map(|s| template::render(s, inputs))
                    .transpose()
                    .map_err(TaskError::Template)?,
                dimensions: call.dimensions(),
            });
        }

        let context = spec
            .upstream
            .iter()
            .filter_map(|dep| {
                let raw = outputs.get(dep).and_then(|r| r.raw_output.as_deref());
                if raw.is_none() {
                    debug!(task = %spec.name, upstream = %dep, "Upstream produced no output");
                }
                raw.map(|raw| ContextBlock::new(dep.clone(), raw))
            })
            .collect();

        Ok(Invocation {
            task: spec.name.clone(),
            prompt,
            context,
            calls,
            policy: spec.provider_failure,
        })
    }
}
