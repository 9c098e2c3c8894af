//! HTTP-level tests for the Model Service clients, the Bing backend and the
//! content fetcher, against a local wiremock server.

use ares_research::llm::client::Provider;
use ares_research::llm::LLMClient;
use ares_research::research::fetcher::fetch_sources;
use ares_research::research::search::BingSearch;
use ares_research::research::{ContentFetcher, HttpContentFetcher, SearchRetriever};
use ares_research::retry::{with_retry, RetryPolicy};
use ares_research::types::{AppError, SearchProviderKind, SearchResult, SourceStatus, TimeFilter};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, 1)
}

fn openai_client(server: &MockServer) -> Box<dyn LLMClient> {
    Provider::OpenAI {
        api_key: "sk-test".to_string(),
        api_base: server.uri(),
        model: "gpt-4o-mini".to_string(),
    }
    .create_client()
    .unwrap()
}

fn chat_completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

// =============================================================================
// Model Service
// =============================================================================

#[tokio::test]
async fn test_openai_sends_system_and_user_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let client = openai_client(&server);
    let reply = client.generate_with_system("be brief", "hello").await.unwrap();

    assert_eq!(reply, "hi there");
    assert_eq!(client.model_name(), "gpt-4o-mini");
}

#[tokio::test]
async fn test_openai_rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("finally")))
        .mount(&server)
        .await;

    let client = openai_client(&server);
    let reply = with_retry(&fast_retry(), || client.generate("hello")).await.unwrap();

    assert_eq!(reply, "finally");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_openai_server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = openai_client(&server);
    let err = with_retry(&fast_retry(), || client.generate("hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Upstream(_)));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_ollama_chat() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3.2", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2",
            "message": {"role": "assistant", "content": "local answer"},
            "done": true
        })))
        .mount(&server)
        .await;

    let client = Provider::Ollama {
        base_url: format!("{}/", server.uri()),
        model: "llama3.2".to_string(),
    }
    .create_client()
    .unwrap();

    assert_eq!(client.generate("hello").await.unwrap(), "local answer");
}

#[tokio::test]
async fn test_ollama_rate_limit_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = Provider::Ollama {
        base_url: server.uri(),
        model: "llama3.2".to_string(),
    }
    .create_client()
    .unwrap();

    assert!(client.generate("hello").await.unwrap_err().is_rate_limited());
}

// =============================================================================
// Search Service
// =============================================================================

fn bing_retriever(server: &MockServer) -> SearchRetriever {
    SearchRetriever::new(fast_retry()).with_backend(
        SearchProviderKind::Bing,
        Arc::new(BingSearch::new(
            format!("{}/v7.0/search", server.uri()),
            "bing-key",
            5,
        )),
    )
}

#[tokio::test]
async fn test_bing_results_are_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v7.0/search"))
        .and(header("Ocp-Apim-Subscription-Key", "bing-key"))
        .and(query_param("q", "rust async"))
        .and(query_param("count", "5"))
        .and(query_param("freshness", "Week"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "webPages": {"value": [
                {"id": "page-1", "url": "https://a.example/1", "name": "A", "snippet": "about a"},
                {"url": "https://b.example/1", "name": "B"}
            ]}
        })))
        .mount(&server)
        .await;

    let results = bing_retriever(&server)
        .search("rust async", TimeFilter::Week, SearchProviderKind::Bing, false)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "page-1");
    assert_eq!(results[1].id, "bing-1");
    assert_eq!(results[1].snippet, "");
    assert!(results.iter().all(|r| r.score == 0.0 && !r.is_custom_url));
}

#[tokio::test]
async fn test_bing_without_web_pages_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v7.0/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_type": "SearchResponse"})))
        .mount(&server)
        .await;

    let results = bing_retriever(&server)
        .search("nothing", TimeFilter::All, SearchProviderKind::Bing, false)
        .await
        .unwrap();

    assert!(results.is_empty());
}

#[tokio::test]
async fn test_bing_rate_limit_exhausts_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v7.0/search"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = bing_retriever(&server)
        .search("rust", TimeFilter::All, SearchProviderKind::Bing, false)
        .await
        .unwrap_err();

    assert!(err.is_rate_limited());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_test_query_never_reaches_the_network() {
    let server = MockServer::start().await;

    let results = bing_retriever(&server)
        .search("test", TimeFilter::All, SearchProviderKind::Bing, false)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(server.received_requests().await.unwrap().is_empty());
}

// =============================================================================
// Content fetching
// =============================================================================

const ARTICLE: &str = r#"<html><head><title>t</title><script>var x = 1;</script></head>
<body><nav>Home | About</nav><article><h1>Async Rust</h1><p>Futures are   lazy.</p></article>
<footer>copyright</footer></body></html>"#;

#[tokio::test]
async fn test_fetcher_extracts_article_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ARTICLE, "text/html; charset=utf-8"))
        .mount(&server)
        .await;

    let fetcher = HttpContentFetcher::new(1_000).unwrap();
    let text = fetcher
        .fetch(&format!("{}/post", server.uri()))
        .await
        .unwrap()
        .unwrap();

    assert!(text.contains("Async Rust"));
    assert!(text.contains("Futures are lazy."));
    assert!(!text.contains("var x"));
    assert!(!text.contains("copyright"));
    assert!(!text.contains("Home | About"));
}

#[tokio::test]
async fn test_fetcher_truncates_long_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/long"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("word ".repeat(500), "text/plain"))
        .mount(&server)
        .await;

    let fetcher = HttpContentFetcher::new(100).unwrap();
    let text = fetcher
        .fetch(&format!("{}/long", server.uri()))
        .await
        .unwrap()
        .unwrap();

    assert!(text.chars().count() <= 100);
}

#[tokio::test]
async fn test_failed_fetch_falls_back_to_snippet() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ARTICLE, "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let sources = vec![
        SearchResult::new("ok", format!("{}/ok", server.uri()), "Ok", "ok snippet"),
        SearchResult::new("missing", format!("{}/missing", server.uri()), "Gone", "gone snippet"),
    ];
    let fetcher = HttpContentFetcher::new(1_000).unwrap();
    let fetched = fetch_sources(&fetcher, &fast_retry(), &sources).await;

    assert_eq!(fetched.len(), 2);
    assert_eq!(fetched[0].status, SourceStatus::Fetched);
    assert!(fetched[0].content.contains("Async Rust"));
    assert_eq!(fetched[1].status, SourceStatus::Preview);
    assert_eq!(fetched[1].content, "gone snippet");
}
