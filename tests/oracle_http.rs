//! HTTP-level tests for the vision oracle client and the OpenAI images
//! adapter against a local mock server: happy-path parsing, fenced JSON,
//! retry behavior and score rescaling.

use bestshot::config::OracleConfig;
use bestshot::model::ImageRef;
use bestshot::oracle::{OracleApi, VisionOracle};
use bestshot::providers::openai::OpenAiImageProvider;
use bestshot::providers::{GenerateContext, ImageProvider};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn oracle_for(server: &MockServer) -> VisionOracle {
    VisionOracle::new(&OracleConfig {
        endpoint: format!("{}/api/v3/chat/completions", server.uri()),
        model: "vision-test".into(),
        api_key: Some("test-key".into()),
        max_attempts: 3,
        backoff_base_ms: 50,
        timeout_secs: 5,
    })
}

fn chat_body(content: &str) -> serde_json::Value {
    json!({ "choices": [{ "message": { "content": content } }] })
}

fn image() -> ImageRef {
    ImageRef::url("https://img/candidate.png")
}

#[tokio::test]
async fn score_parses_a_plain_scorecard() {
    let server = MockServer::start().await;
    let scorecard = json!({
        "prompt_adherence": {"score": 9, "comment": "on brief"},
        "anatomical_integrity": {"score": 7},
        "final_score": 8.2,
    });
    Mock::given(method("POST"))
        .and(path("/api/v3/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "vision-test"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&scorecard.to_string())))
        .expect(1)
        .mount(&server)
        .await;

    let result = oracle_for(&server).score(&image(), "a vase").await.unwrap();
    assert_eq!(result.entries["prompt_adherence"].score, 9.0);
    assert_eq!(
        result.entries["prompt_adherence"].comment.as_deref(),
        Some("on brief")
    );
    assert_eq!(result.entries["final_score"].score, 8.2);
}

#[tokio::test]
async fn score_tolerates_markdown_fences() {
    let server = MockServer::start().await;
    let fenced = format!(
        "```json\n{}\n```",
        json!({"aesthetic_value": {"score": 6.5}})
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&fenced)))
        .mount(&server)
        .await;

    let result = oracle_for(&server).score(&image(), "a vase").await.unwrap();
    assert_eq!(result.entries["aesthetic_value"].score, 6.5);
}

#[tokio::test]
async fn transient_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_body(&json!({"cleanliness": 8}).to_string())),
        )
        .mount(&server)
        .await;

    let result = oracle_for(&server).score(&image(), "a vase").await.unwrap();
    assert_eq!(result.entries["cleanliness"].score, 8.0);
}

#[tokio::test]
async fn client_errors_do_not_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = oracle_for(&server).score(&image(), "a vase").await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn malformed_content_is_reported_not_panicked() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("not json at all")))
        .mount(&server)
        .await;

    let err = oracle_for(&server).score(&image(), "a vase").await.unwrap_err();
    assert!(err.to_string().contains("malformed"));
}

#[tokio::test]
async fn consistency_scores_above_one_are_rescaled() {
    let server = MockServer::start().await;
    let content = json!({"score": 86, "comment": "same subject"}).to_string();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&content)))
        .mount(&server)
        .await;

    let verdict = oracle_for(&server)
        .verify_consistency(&[ImageRef::url("https://img/ref.png")], &image())
        .await
        .unwrap();
    assert!((verdict.score - 0.86).abs() < 1e-9);
    assert_eq!(verdict.comment.as_deref(), Some("same subject"));
}

#[tokio::test]
async fn compare_returns_the_parsed_object() {
    let server = MockServer::start().await;
    let content = json!({
        "title": "Winner",
        "analysis": "leads on structure 9.0 vs 4.0",
        "key_difference": "structure",
    })
    .to_string();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&content)))
        .mount(&server)
        .await;

    let value = oracle_for(&server)
        .compare(&[image(), image()], "compare these")
        .await
        .unwrap();
    assert_eq!(value["key_difference"], "structure");
}

// ─── OpenAI images adapter ──────────────────────────────────────────────────

fn generate_context() -> GenerateContext {
    GenerateContext {
        prompt: "a ceramic vase".into(),
        references: vec![],
        size: "2048x2048".into(),
        count: 2,
        params: serde_json::Value::Null,
    }
}

#[tokio::test]
async fn openai_adapter_maps_url_and_inline_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .and(header("Authorization", "Bearer img-key"))
        .and(body_partial_json(json!({
            "prompt": "a ceramic vase",
            "n": 2,
            "size": "1024x1024",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"url": "https://img/one.png"},
                {"b64_json": "aGVsbG8="},
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiImageProvider::with_base_url(Some("img-key"), &server.uri());
    let images = provider.generate(&generate_context()).await.unwrap();

    assert_eq!(images.len(), 2);
    assert_eq!(images[0].image, ImageRef::url("https://img/one.png"));
    assert_eq!(images[1].image, ImageRef::inline("image/png", "aGVsbG8="));
}

#[tokio::test]
async fn openai_adapter_surfaces_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({"error": {"message": "slow down"}})),
        )
        .mount(&server)
        .await;

    let provider = OpenAiImageProvider::with_base_url(Some("img-key"), &server.uri());
    let err = provider.generate(&generate_context()).await.unwrap_err();
    assert!(err.to_string().contains("429"));
}

#[tokio::test]
async fn openai_adapter_rejects_empty_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let provider = OpenAiImageProvider::with_base_url(Some("img-key"), &server.uri());
    let err = provider.generate(&generate_context()).await.unwrap_err();
    assert!(err.to_string().contains("no usable image"));
}
