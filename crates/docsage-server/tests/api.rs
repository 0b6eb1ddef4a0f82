//! HTTP surface tests: drive the router in-process with `oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::post;
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use docsage_core::{AppConfig, LlmProvider, ServiceMode};
use docsage_ingest::Ingester;
use docsage_runtime::ChatOrchestrator;
use docsage_server::{build_router, AppState};

fn mock_app() -> Router {
    let state = AppState::new(AppConfig::default(), ChatOrchestrator::mock());
    build_router(Arc::new(state))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_chat(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(mock_app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_empty_question_prompts_for_input() {
    for body in [
        serde_json::json!({ "question": "" }),
        serde_json::json!({ "query": "   " }),
        serde_json::json!({}),
    ] {
        let (status, body) = send(mock_app(), post_chat(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Vui lòng nhập câu hỏi.");
        assert_eq!(body["mode"], "mock");
        assert_eq!(body["confidence"], 0.0);
        assert_eq!(body["sources"], serde_json::json!([]));
    }
}

#[tokio::test]
async fn test_mock_answer_shape() {
    let (status, body) = send(
        mock_app(),
        post_chat(serde_json::json!({ "query": "Chính sách remote work?" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sources"], serde_json::json!(["company_policy.pdf"]));
    assert_eq!(body["mode"], "mock");
    assert!((body["confidence"].as_f64().unwrap() - 0.75).abs() < 1e-6);
    assert!(body["answer"]
        .as_str()
        .unwrap()
        .contains("'Chính sách remote work?'"));
    assert_eq!(body.as_object().unwrap().len(), 4);
}

/// Serve a fake chat-completions endpoint and return its base URL.
async fn fake_llm(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

async fn generative_app(dir: &TempDir, llm_base_url: String) -> Router {
    let data_dir = dir.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(
        data_dir.join("leave_policy.txt"),
        "Annual leave: every employee receives twelve days of paid leave per year.",
    )
    .unwrap();
    std::fs::write(
        data_dir.join("hiring_process.md"),
        "# Hiring\nScreening call, technical interview, then an offer.",
    )
    .unwrap();

    let mut config = AppConfig::default();
    config.mode = ServiceMode::Generative;
    config.paths.data_dir = data_dir.clone();
    config.paths.index_dir = dir.path().join("vectorstore");
    config.llm.provider = LlmProvider::Local;
    config.llm.base_url = Some(llm_base_url);

    Ingester::from_config(&config)
        .unwrap()
        .run(&data_dir, &config.paths.index_dir)
        .await
        .unwrap();

    build_router(Arc::new(AppState::from_config(config).unwrap()))
}

#[tokio::test]
async fn test_generative_answer() {
    let sse = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Twelve days \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"of paid leave.\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    let llm = Router::new().route(
        "/v1/chat/completions",
        post(move || async move { ([(header::CONTENT_TYPE, "text/event-stream")], sse) }),
    );
    let dir = TempDir::new().unwrap();
    let app = generative_app(&dir, fake_llm(llm).await).await;

    let (status, body) = send(
        app,
        post_chat(serde_json::json!({ "question": "How many days of annual leave?" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Twelve days of paid leave.");
    assert_eq!(body["mode"], "generative");
    assert_eq!(body["sources"][0], "leave_policy.txt");
    let confidence = body["confidence"].as_f64().unwrap();
    assert!(confidence > 0.0 && confidence <= 1.0);
}

#[tokio::test]
async fn test_generation_failure_is_service_unavailable() {
    let llm = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "out of memory") }),
    );
    let dir = TempDir::new().unwrap();
    let app = generative_app(&dir, fake_llm(llm).await).await;

    let (status, body) = send(app, post_chat(serde_json::json!({ "question": "leave?" }))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("generation"));
}

#[tokio::test]
async fn test_generative_startup_without_index_fails() {
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.mode = ServiceMode::Generative;
    config.paths.index_dir = dir.path().join("missing");
    assert!(AppState::from_config(config).is_err());
}

#[tokio::test]
async fn test_reloaded_index_serves_new_documents() {
    let sse = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Within thirty days.\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    let llm = Router::new().route(
        "/v1/chat/completions",
        post(move || async move { ([(header::CONTENT_TYPE, "text/event-stream")], sse) }),
    );
    let base_url = fake_llm(llm).await;

    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(
        data_dir.join("leave_policy.txt"),
        "Annual leave: every employee receives twelve days of paid leave per year.",
    )
    .unwrap();

    let mut config = AppConfig::default();
    config.mode = ServiceMode::Generative;
    config.paths.data_dir = data_dir.clone();
    config.paths.index_dir = dir.path().join("vectorstore");
    config.llm.provider = LlmProvider::Local;
    config.llm.base_url = Some(base_url);
    // Keep every retrieved chunk so sources reflect the whole index.
    config.retrieval.min_score = -1.0;

    let ingester = Ingester::from_config(&config).unwrap();
    ingester.run(&data_dir, &config.paths.index_dir).await.unwrap();
    let state = Arc::new(AppState::from_config(config.clone()).unwrap());
    let app = build_router(Arc::clone(&state));
    let question = serde_json::json!({ "question": "expense claims reimbursed within days" });

    let (_, before) = send(app.clone(), post_chat(question.clone())).await;
    assert_eq!(before["sources"], serde_json::json!(["leave_policy.txt"]));

    std::fs::write(
        data_dir.join("expense_policy.txt"),
        "Expense claims are reimbursed within thirty days of submission.",
    )
    .unwrap();
    ingester.run(&data_dir, &config.paths.index_dir).await.unwrap();

    // Not visible until the running service swaps the rebuilt index in.
    let (_, stale) = send(app.clone(), post_chat(question.clone())).await;
    assert_eq!(stale["sources"], before["sources"]);

    assert_eq!(state.reload_index().unwrap(), 2);
    let (status, after) = send(app, post_chat(question)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["sources"][0], "expense_policy.txt");
}
