//! Test doubles shared by the integration tests.

use async_trait::async_trait;
use cvforge::agent::Agent;
use cvforge::backend::{BackendError, GenerationRequest, GenerativeBackend};
use cvforge::capability::{
    CapabilityKind, CapabilityOutput, CapabilityProvider, CapabilityRequest, CapabilitySet,
    FailureKind, ProviderFailure,
};
use cvforge::pipeline::{FailurePolicy, TaskSpec};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Backend with canned replies per task. Unscripted tasks echo their name.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<HashMap<String, Result<String, BackendError>>>,
    calls: Mutex<Vec<GenerationRequest>>,
    delay: Option<Duration>,
    in_flight: Mutex<(usize, usize)>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn reply(&self, task: &str, text: impl Into<String>) {
        self.replies.lock().insert(task.to_string(), Ok(text.into()));
    }

    pub fn fail(&self, task: &str) {
        self.replies.lock().insert(
            task.to_string(),
            Err(BackendError::Api {
                status: 400,
                message: format!("{} rejected", task),
            }),
        );
    }

    /// Task names in call order.
    pub fn called(&self) -> Vec<String> {
        self.calls.lock().iter().map(|r| r.task.clone()).collect()
    }

    pub fn request_for(&self, task: &str) -> Option<GenerationRequest> {
        self.calls.lock().iter().find(|r| r.task == task).cloned()
    }

    /// Highest number of simultaneous generate calls seen.
    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.lock().1
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        self.calls.lock().push(request.clone());
        {
            let mut counts = self.in_flight.lock();
            counts.0 += 1;
            counts.1 = counts.1.max(counts.0);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.lock().0 -= 1;
        self.replies
            .lock()
            .get(&request.task)
            .cloned()
            .unwrap_or_else(|| Ok(format!("output of {}", request.task)))
    }
}

/// Provider that always fails with the given kind.
pub struct FailingProvider {
    pub kind: CapabilityKind,
    pub failure: FailureKind,
    pub calls: Mutex<usize>,
}

impl FailingProvider {
    pub fn new(kind: CapabilityKind, failure: FailureKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            failure,
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl CapabilityProvider for FailingProvider {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn kind(&self) -> CapabilityKind {
        self.kind
    }

    fn description(&self) -> &str {
        "always fails"
    }

    async fn invoke(&self, _request: CapabilityRequest) -> Result<CapabilityOutput, ProviderFailure> {
        *self.calls.lock() += 1;
        Err(ProviderFailure::new(
            self.kind.as_str(),
            self.failure,
            "scripted failure",
        ))
    }
}

pub fn agent(id: &str, backend: Arc<ScriptedBackend>, capabilities: CapabilitySet) -> Arc<Agent> {
    Arc::new(Agent::new(id, id, format!("You are {}.", id), backend, capabilities))
}

pub fn task(name: &str, agent: &str, upstream: &[&str]) -> TaskSpec {
    TaskSpec {
        name: name.to_string(),
        agent: agent.to_string(),
        prompt: format!("Perform {}.", name),
        upstream: upstream.iter().map(|s| s.to_string()).collect(),
        output_schema: None,
        provider_failure: FailurePolicy::Fatal,
        capability_calls: Vec::new(),
        timeout_secs: None,
        description: None,
    }
}
