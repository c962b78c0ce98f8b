use cvforge::capability::{
    CapabilityOutput, CapabilityProvider, CapabilityRequest, FailureKind, PageFetchProvider,
    RepositoryProvider, WebSearchProvider,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn web_search_returns_ranked_hits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .and(query_param("q", "Ada Lovelace"))
        .and(query_param("key", "k"))
        .and(query_param("cx", "engine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"title": "Ada Lovelace", "link": "https://a.example", "snippet": "Mathematician"},
                {"link": "https://b.example"},
                {"title": "Third", "link": "https://c.example", "snippet": "dropped"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = WebSearchProvider::new(
        format!("{}/customsearch/v1", server.uri()),
        Some("k".to_string()),
        Some("engine".to_string()),
        2,
        TIMEOUT,
    )
    .unwrap();
    let output = provider
        .invoke(CapabilityRequest::WebSearch {
            query: "Ada Lovelace".to_string(),
        })
        .await
        .unwrap();

    match output {
        CapabilityOutput::SearchResults { hits } => {
            assert_eq!(hits.len(), 2);
            assert_eq!(hits[0].title, "Ada Lovelace");
            assert_eq!(hits[1].title, "No Title");
            assert_eq!(hits[1].snippet, "");
        }
        other => panic!("unexpected output {:?}", other),
    }
}

#[tokio::test]
async fn web_search_without_credentials_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider = WebSearchProvider::new(server.uri(), None, Some("engine".to_string()), 5, TIMEOUT)
        .unwrap();
    let failure = provider
        .invoke(CapabilityRequest::WebSearch {
            query: "anything".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::MissingCredential);
}

#[tokio::test]
async fn web_search_quota_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let provider = WebSearchProvider::new(
        server.uri(),
        Some("k".to_string()),
        Some("engine".to_string()),
        5,
        TIMEOUT,
    )
    .unwrap();
    let failure = provider
        .invoke(CapabilityRequest::WebSearch {
            query: "q".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::RateLimited);
    assert!(failure.message.contains("quota exceeded"));
}

#[tokio::test]
async fn repositories_skip_forks_and_send_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/ada/repos"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "engine", "description": "Difference engine", "html_url": "https://github.com/ada/engine", "language": "Rust", "fork": false},
            {"name": "forked", "description": null, "html_url": "https://github.com/ada/forked", "language": "C", "fork": true},
            {"name": "notes", "description": "  ", "html_url": "https://github.com/ada/notes", "language": null}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let provider =
        RepositoryProvider::new(server.uri(), Some("secret".to_string()), 10, TIMEOUT).unwrap();
    let output = provider
        .invoke(CapabilityRequest::Repositories {
            username: "https://github.com/ada/".to_string(),
        })
        .await
        .unwrap();

    match output {
        CapabilityOutput::Repositories {
            username,
            repositories,
        } => {
            assert_eq!(username, "https://github.com/ada/");
            let names: Vec<&str> = repositories.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, vec!["engine", "notes"]);
            assert!(repositories[1].description.is_none());
        }
        other => panic!("unexpected output {:?}", other),
    }
}

#[tokio::test]
async fn repositories_exhausted_quota_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/ada/repos"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .set_body_string("API rate limit exceeded"),
        )
        .mount(&server)
        .await;

    let provider = RepositoryProvider::new(server.uri(), None, 10, TIMEOUT).unwrap();
    let failure = provider
        .invoke(CapabilityRequest::Repositories {
            username: "ada".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::RateLimited);
}

#[tokio::test]
async fn repositories_unknown_user_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let provider = RepositoryProvider::new(server.uri(), None, 10, TIMEOUT).unwrap();
    let failure = provider
        .invoke(CapabilityRequest::Repositories {
            username: "nobody-here".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::NotFound);
}

#[tokio::test]
async fn page_fetch_converts_html_and_truncates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/in/ada"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><head><title>x</title></head><body><h1>Ada Lovelace</h1><script>track()</script><p>Analyst at Engines Ltd</p></body></html>",
            "text/html; charset=utf-8",
        ))
        .mount(&server)
        .await;

    let provider = PageFetchProvider::new(TIMEOUT, 10_000).unwrap();
    let url = format!("{}/in/ada", server.uri());
    let output = provider
        .invoke(CapabilityRequest::PageFetch { url: url.clone() })
        .await
        .unwrap();
    match output {
        CapabilityOutput::PageText { url: fetched, text } => {
            assert_eq!(fetched, url);
            assert!(text.contains("Ada Lovelace"));
            assert!(text.contains("Analyst at Engines Ltd"));
            assert!(!text.contains("track()"));
        }
        other => panic!("unexpected output {:?}", other),
    }

    let short = PageFetchProvider::new(TIMEOUT, 5).unwrap();
    match short
        .invoke(CapabilityRequest::PageFetch { url })
        .await
        .unwrap()
    {
        CapabilityOutput::PageText { text, .. } => assert_eq!(text.chars().count(), 5),
        other => panic!("unexpected output {:?}", other),
    }
}

#[tokio::test]
async fn page_fetch_missing_page_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let provider = PageFetchProvider::new(TIMEOUT, 100).unwrap();
    let failure = provider
        .invoke(CapabilityRequest::PageFetch {
            url: format!("{}/gone", server.uri()),
        })
        .await
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::NotFound);
}
