use cvforge::backend::{
    build_backend, AnthropicBackend, BackendConfig, BackendError, BackendType, CompletionOptions,
    ContextBlock, GenerationRequest, GenerativeBackend, OpenAiCompatibleBackend, RetryPolicy,
    RetryingBackend,
};
use cvforge::error::ApiError;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(backend_type: BackendType, endpoint: &str) -> BackendConfig {
    BackendConfig {
        backend_type,
        model: "test-model".to_string(),
        api_key: Some("sk-test".to_string()),
        api_key_env: None,
        endpoint: Some(endpoint.to_string()),
        options: CompletionOptions {
            temperature: Some(0.2),
            max_tokens: Some(512),
        },
        retry: RetryPolicy {
            max_retries: 0,
            base_delay_ms: 1,
        },
    }
}

fn request() -> GenerationRequest {
    GenerationRequest {
        task: "extract_resume_data".to_string(),
        system_prompt: "You extract facts.".to_string(),
        prompt: "List the candidate's skills.".to_string(),
        context: vec![ContextBlock::new("document_text", "Skills: Rust, SQL")],
        capabilities: Vec::new(),
    }
}

fn chat_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": text}}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 4}
    }))
}

#[tokio::test]
async fn openai_compatible_posts_chat_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "max_tokens": 512,
            "messages": [{"role": "system", "content": "You extract facts."}]
        })))
        .respond_with(chat_reply("Rust, SQL"))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = format!("{}/v1/", server.uri());
    let backend = OpenAiCompatibleBackend::new(
        "mistral",
        &config(BackendType::Mistral, &endpoint),
        Some("sk-test".to_string()),
    )
    .unwrap();
    assert_eq!(backend.generate(&request()).await.unwrap(), "Rust, SQL");
}

#[tokio::test]
async fn openai_error_envelope_becomes_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "model not found", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let backend = OpenAiCompatibleBackend::new(
        "openai",
        &config(BackendType::OpenAI, &server.uri()),
        Some("sk-test".to_string()),
    )
    .unwrap();
    let err = backend.generate(&request()).await.unwrap_err();
    assert_eq!(
        err,
        BackendError::Api {
            status: 400,
            message: "model not found".to_string()
        }
    );
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn empty_choice_is_empty_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(chat_reply("   "))
        .mount(&server)
        .await;

    let backend = OpenAiCompatibleBackend::new(
        "ollama",
        &config(BackendType::Ollama, &server.uri()),
        None,
    )
    .unwrap();
    assert_eq!(
        backend.generate(&request()).await.unwrap_err(),
        BackendError::EmptyContent
    );
}

#[tokio::test]
async fn anthropic_sends_version_and_key_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "system": "You extract facts.",
            "max_tokens": 512
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "Rust"},
                {"type": "tool_use", "id": "t1", "name": "noop", "input": {}},
                {"type": "text", "text": ", SQL"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = AnthropicBackend::new(
        "claude",
        &config(BackendType::Anthropic, &server.uri()),
        Some("sk-test".to_string()),
    )
    .unwrap();
    assert_eq!(backend.generate(&request()).await.unwrap(), "Rust, SQL");
}

#[tokio::test]
async fn retry_recovers_from_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(chat_reply("second time lucky"))
        .mount(&server)
        .await;

    let inner = Arc::new(
        OpenAiCompatibleBackend::new(
            "mistral",
            &config(BackendType::Mistral, &server.uri()),
            Some("sk-test".to_string()),
        )
        .unwrap(),
    );
    let backend = RetryingBackend::new(
        inner,
        RetryPolicy {
            max_retries: 2,
            base_delay_ms: 1,
        },
    );
    assert_eq!(
        backend.generate(&request()).await.unwrap(),
        "second time lucky"
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn retries_give_up_after_policy_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let mut cfg = config(BackendType::Mistral, &server.uri());
    cfg.retry = RetryPolicy {
        max_retries: 2,
        base_delay_ms: 1,
    };
    let backend = build_backend("mistral", &cfg).unwrap();
    match backend.generate(&request()).await.unwrap_err() {
        BackendError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, BackendError::Api { status: 503, .. }));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn build_backend_without_key_is_config_error() {
    let mut cfg = config(BackendType::OpenRouter, "https://openrouter.ai/api/v1");
    cfg.api_key = None;
    cfg.api_key_env = Some("CVFORGE_TEST_KEY_THAT_IS_NEVER_SET".to_string());
    match build_backend("router", &cfg) {
        Err(ApiError::ConfigError(message)) => {
            assert!(message.contains("CVFORGE_TEST_KEY_THAT_IS_NEVER_SET"), "{}", message)
        }
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("expected a configuration error"),
    }
}

#[test]
fn build_backend_rejects_bad_endpoint() {
    let cfg = config(BackendType::Mistral, "not a url");
    assert!(matches!(
        build_backend("mistral", &cfg),
        Err(ApiError::ConfigError(_))
    ));
}
