use crate::support::{agent, task, FailingProvider, ScriptedBackend};
use cvforge::backend::BackendRegistry;
use cvforge::capability::{
    CapabilityKind, CapabilityRegistry, CapabilitySet, DocumentTextProvider, FailureKind,
    ImageNormalizeProvider, JobKeywordProvider,
};
use cvforge::error::ApiError;
use cvforge::pipeline::{
    CapabilityCall, FailurePolicy, PipelineDefinition, PipelineRunner, RunStatus, RunnerConfig,
    TaskError, TaskGraph, TaskState,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn runner() -> PipelineRunner {
    PipelineRunner::new(RunnerConfig::default())
}

#[tokio::test]
async fn failed_root_skips_every_descendant() {
    let backend = ScriptedBackend::new();
    backend.fail("a");
    let graph = TaskGraph::build(
        vec![
            task("a", "w", &[]),
            task("b", "w", &["a"]),
            task("c", "w", &["a"]),
            task("d", "w", &["b", "c"]),
        ],
        vec![agent("w", backend.clone(), CapabilitySet::new())],
    )
    .unwrap();

    let result = runner().run(&graph, &BTreeMap::new()).await.unwrap();

    assert_eq!(backend.called(), vec!["a".to_string()]);
    match &result.status {
        RunStatus::Failed { task, cause } => {
            assert_eq!(task, "a");
            assert!(matches!(cause, TaskError::Backend(_)));
        }
        other => panic!("unexpected status {:?}", other),
    }
    for name in ["b", "c", "d"] {
        assert_eq!(result.result(name).unwrap().state, TaskState::Pending);
    }
    let err = result.into_result().unwrap_err();
    assert_eq!(err.failed_task(), Some("a"));
}

#[tokio::test]
async fn cycle_is_rejected_before_any_backend_call() {
    let backend = ScriptedBackend::new();
    let err = TaskGraph::build(
        vec![
            task("a", "w", &["b"]),
            task("b", "w", &["a"]),
            task("c", "w", &[]),
        ],
        vec![agent("w", backend.clone(), CapabilitySet::new())],
    )
    .unwrap_err();
    assert!(matches!(err, ApiError::ConfigError(_)));
    assert!(err.to_string().contains("cycle detected: a -> b -> a"));
    assert!(backend.called().is_empty());
}

#[tokio::test]
async fn rate_limited_capability_with_fatal_policy_fails_task() {
    let backend = ScriptedBackend::new();
    let search = FailingProvider::new(CapabilityKind::WebSearch, FailureKind::RateLimited);
    let mut lookup = task("lookup", "researcher", &[]);
    lookup.capability_calls.push(CapabilityCall {
        capability: "web_search".to_string(),
        argument: "Ada Lovelace".to_string(),
        secondary: None,
        width: None,
        height: None,
    });
    let graph = TaskGraph::build(
        vec![lookup],
        vec![agent(
            "researcher",
            backend.clone(),
            CapabilitySet::new().with(search.clone()),
        )],
    )
    .unwrap();

    let result = runner().run(&graph, &BTreeMap::new()).await.unwrap();

    let lookup = result.result("lookup").unwrap();
    assert_eq!(lookup.state, TaskState::Failed);
    match &lookup.error {
        Some(TaskError::Provider(failure)) => {
            assert_eq!(failure.kind, FailureKind::RateLimited);
            assert_eq!(failure.capability, "web_search");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(*search.calls.lock(), 1);
    assert!(backend.called().is_empty());
}

#[tokio::test]
async fn capability_outside_agent_set_is_a_config_error() {
    let backend = ScriptedBackend::new();
    let mut lookup = task("lookup", "writer", &[]);
    lookup.capability_calls.push(CapabilityCall {
        capability: "web_search".to_string(),
        argument: "x".to_string(),
        secondary: None,
        width: None,
        height: None,
    });
    let err = TaskGraph::build(
        vec![lookup],
        vec![agent("writer", backend, CapabilitySet::new())],
    )
    .unwrap_err();
    assert!(err.to_string().contains("does not hold"));
}

#[tokio::test(start_paused = true)]
async fn same_stage_tasks_respect_concurrency_bound() {
    for (width, expected_peak) in [(1, 1), (2, 2), (8, 3)] {
        let backend = ScriptedBackend::with_delay(Duration::from_millis(50));
        let graph = TaskGraph::build(
            vec![
                task("root", "w", &[]),
                task("b", "w", &["root"]),
                task("c", "w", &["root"]),
                task("d", "w", &["root"]),
                task("join", "w", &["b", "c", "d"]),
            ],
            vec![agent("w", backend.clone(), CapabilitySet::new())],
        )
        .unwrap();
        let result = PipelineRunner::new(RunnerConfig {
            max_concurrency: width,
            task_timeout: Duration::from_secs(60),
        })
        .run(&graph, &BTreeMap::new())
        .await
        .unwrap();
        assert!(result.is_success());
        assert_eq!(backend.peak_in_flight(), expected_peak, "width {}", width);
        let called = backend.called();
        assert_eq!(called.first().map(String::as_str), Some("root"));
        assert_eq!(called.last().map(String::as_str), Some("join"));
    }
}

#[tokio::test]
async fn cancellation_stops_launching_new_tasks() {
    use cvforge::pipeline::{RunObserver, TaskResult};
    use tokio_util::sync::CancellationToken;

    struct CancelAfterFirst(CancellationToken);
    impl RunObserver for CancelAfterFirst {
        fn task_finished(&self, _result: &TaskResult) {
            self.0.cancel();
        }
    }

    let backend = ScriptedBackend::new();
    let graph = TaskGraph::build(
        vec![task("a", "w", &[]), task("b", "w", &["a"])],
        vec![agent("w", backend.clone(), CapabilitySet::new())],
    )
    .unwrap();
    let token = CancellationToken::new();
    let result = runner()
        .with_cancellation(token.clone())
        .with_observer(Arc::new(CancelAfterFirst(token)))
        .run(&graph, &BTreeMap::new())
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.result("a").unwrap().state, TaskState::Succeeded);
    assert_eq!(result.result("b").unwrap().state, TaskState::Pending);
    assert_eq!(backend.called(), vec!["a".to_string()]);
}

/// The built-in resume pipeline wired to a scripted backend, local providers
/// and failing network providers.
struct ResumeHarness {
    _temp: TempDir,
    backend: Arc<ScriptedBackend>,
    graph: TaskGraph,
    inputs: BTreeMap<String, String>,
}

impl ResumeHarness {
    fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let resume = temp.path().join("resume.txt");
        std::fs::write(
            &resume,
            "Ada Lovelace\nAnalyst, Analytical Engines Ltd, 1842-1843\nSkills: Rust, mathematics",
        )
        .unwrap();

        let backend = ScriptedBackend::new();
        let mut backends = BackendRegistry::new();
        backends.insert("mistral", backend.clone());

        let mut capabilities = CapabilityRegistry::new();
        capabilities.register(Arc::new(DocumentTextProvider::new(1000, 100)));
        capabilities.register(Arc::new(JobKeywordProvider::new(20)));
        capabilities.register(Arc::new(ImageNormalizeProvider::new(None)));
        for kind in [
            CapabilityKind::WebSearch,
            CapabilityKind::PageFetch,
            CapabilityKind::Repositories,
        ] {
            capabilities.register(FailingProvider::new(kind, FailureKind::RateLimited));
        }

        let definition = PipelineDefinition::builtin().unwrap();
        let graph = definition
            .build_graph("mistral", &backends, &capabilities, temp.path())
            .unwrap();

        let inputs = BTreeMap::from([
            ("resume_path".to_string(), resume.display().to_string()),
            (
                "job_posting".to_string(),
                "Rust engineer at Example Corp. Rust and Kubernetes required.".to_string(),
            ),
            (
                "linkedin_url".to_string(),
                "https://www.linkedin.com/in/ada".to_string(),
            ),
            ("github_username".to_string(), "ada".to_string()),
            ("profile_image".to_string(), String::new()),
        ]);

        backend.reply(
            "analyze_job_posting",
            "```json\n{\"title\": \"Rust engineer\", \"company\": \"Example Corp\", \"required_skills\": [\"Rust\", \"Kubernetes\"]}\n```",
        );

        Self {
            _temp: temp,
            backend,
            graph,
            inputs,
        }
    }

    fn profile_reply(&self, profile: serde_json::Value) {
        self.backend.reply(
            "structure_candidate_profile",
            format!("Here is the profile:\n```json\n{}\n```", profile),
        );
    }
}

fn profile_json() -> serde_json::Value {
    json!({
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "experience": [{"job_title": "Analyst", "company": "Analytical Engines Ltd"}],
        "education": [],
        "skills": {"technical_skills": ["Rust"], "soft_skills": ["Communication"]},
        "projects": [],
        "resume_comparison": {
            "matching_skills": ["Rust"],
            "missing_skills": ["Kubernetes"],
            "experience_match": "Strong analytical background",
            "improvement_suggestions": ["Show container work"]
        }
    })
}

#[tokio::test]
async fn resume_facts_flow_into_the_structured_profile() {
    let harness = ResumeHarness::new();
    harness.profile_reply(profile_json());

    let result = runner()
        .run(&harness.graph, &harness.inputs)
        .await
        .unwrap();
    assert!(result.is_success(), "{:?}", result.status);

    let resume_request = harness.backend.request_for("extract_resume_data").unwrap();
    assert_eq!(resume_request.context[0].source, "document_text");
    assert!(resume_request.context[0].content.contains("Analytical Engines"));

    let structure = harness
        .backend
        .request_for("structure_candidate_profile")
        .unwrap();
    let sources: Vec<&str> = structure.context.iter().map(|c| c.source.as_str()).collect();
    assert_eq!(
        sources,
        vec![
            "extract_resume_data",
            "extract_linkedin_data",
            "analyze_github",
            "analyze_job_posting",
            "compare_resume_to_job",
        ]
    );
    assert_eq!(structure.context[0].content, "output of extract_resume_data");

    let profile = result.structured("structure_candidate_profile").unwrap();
    assert_eq!(profile["name"], "Ada Lovelace");
    assert_eq!(
        result.structured("analyze_job_posting").unwrap()["company"],
        "Example Corp"
    );

    // Network enrichment and the missing photo degrade into warnings.
    let warned: Vec<&str> = result.warnings().iter().map(|(task, _)| *task).collect();
    assert!(warned.contains(&"extract_linkedin_data"));
    assert!(warned.contains(&"analyze_github"));
    assert!(warned.contains(&"layout_resume"));
    assert_eq!(result.count(TaskState::Succeeded), 8);
}

#[tokio::test]
async fn profile_without_name_fails_structuring() {
    let harness = ResumeHarness::new();
    let mut profile = profile_json();
    profile.as_object_mut().unwrap().remove("name");
    harness.profile_reply(profile);

    let result = runner()
        .run(&harness.graph, &harness.inputs)
        .await
        .unwrap();

    match &result.status {
        RunStatus::Failed { task, cause } => {
            assert_eq!(task, "structure_candidate_profile");
            match cause {
                TaskError::Schema(err) => assert_eq!(err.field.as_deref(), Some("name")),
                other => panic!("unexpected cause {:?}", other),
            }
        }
        other => panic!("unexpected status {:?}", other),
    }
    let structure = result.result("structure_candidate_profile").unwrap();
    assert!(structure.structured.is_none());
    assert!(structure.raw_output.is_some());
    assert_eq!(
        result.result("draft_resume_content").unwrap().state,
        TaskState::Pending
    );
    assert!(!harness
        .backend
        .called()
        .contains(&"draft_resume_content".to_string()));
}

#[tokio::test]
async fn optional_enrichment_under_fatal_policy_fails_run() {
    let backend = ScriptedBackend::new();
    let mut layout = task("layout", "designer", &[]);
    layout.provider_failure = FailurePolicy::Fatal;
    layout.capability_calls.push(CapabilityCall {
        capability: "image_normalize".to_string(),
        argument: "{profile_image}".to_string(),
        secondary: None,
        width: Some(100),
        height: None,
    });
    let graph = TaskGraph::build(
        vec![layout],
        vec![agent(
            "designer",
            backend.clone(),
            CapabilitySet::new().with(Arc::new(ImageNormalizeProvider::new(None))),
        )],
    )
    .unwrap();
    let inputs = BTreeMap::from([("profile_image".to_string(), String::new())]);
    let result = runner().run(&graph, &inputs).await.unwrap();
    match result.result("layout").unwrap().error.as_ref() {
        Some(TaskError::Provider(failure)) => {
            assert_eq!(failure.kind, FailureKind::InvalidRequest)
        }
        other => panic!("unexpected error {:?}", other),
    }
}
