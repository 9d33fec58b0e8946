mod common;

use axum::body::{ to_bytes, Body };
use axum::http::{ Request, StatusCode };
use axum::Router;
use common::{ assistant, reply, ScriptedChat, ScriptedCheck };
use dev_assistant::llm::chat::anthropic::AnthropicChatClient;
use dev_assistant::server::api::router;
use serde_json::{ json, Value };
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

fn app(root: &Path, replies: Vec<String>, api_key: Option<&str>) -> Router {
    let chat = ScriptedChat::new(replies);
    let assistant = Arc::new(assistant(root, chat, ScriptedCheck::new(vec![])));
    router(assistant, api_key.map(str::to_string))
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

#[tokio::test]
async fn chat_without_messages_is_bad_request() {
    let project = tempfile::tempdir().unwrap();
    let app = app(project.path(), vec![], None);

    let (status, body) = send(&app, post("/api/chat", "{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Messages are required.");

    let (status, body) = send(&app, post("/api/chat", r#"{"messages": []}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Messages are required.");
}

#[tokio::test]
async fn chat_with_unknown_role_or_bad_json_is_bad_request() {
    let project = tempfile::tempdir().unwrap();
    let app = app(project.path(), vec![], None);

    let body = r#"{"messages": [{"role": "tool", "content": "x"}]}"#;
    let (status, body) = send(&app, post("/api/chat", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, post("/api/chat", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_success_returns_outcome_fields() {
    let project = tempfile::tempdir().unwrap();
    let app = app(
        project.path(),
        vec![reply("Created the page.", &[("app/about/page.tsx", "about")])],
        None
    );

    let body = json!({ "messages": [{ "role": "user", "content": "add an about page" }] });
    let (status, body) = send(&app, post("/api/chat", &body.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Created the page.");
    assert_eq!(body["changes"], json!(["app/about/page.tsx"]));
    assert_eq!(body["errors"], json!([]));
    assert_eq!(body["fixed"], false);
    assert_eq!(body["cacheStats"]["cacheReadInputTokens"], 50);

    let (status, listing) = send(&app, get("/api/versions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["versions"].as_array().unwrap().len(), 1);
    assert_eq!(listing["current"], listing["versions"][0]["id"]);
    assert_eq!(listing["versions"][0]["files"]["app/about/page.tsx"], "about");
}

#[tokio::test]
async fn chat_without_credentials_is_server_error() {
    let project = tempfile::tempdir().unwrap();
    let client = Arc::new(AnthropicChatClient::new(None, None, None).unwrap());
    let assistant = Arc::new(assistant(project.path(), client, ScriptedCheck::new(vec![])));
    let app = router(assistant, None);

    let body = json!({ "messages": [{ "role": "user", "content": "hi" }] });
    let (status, body) = send(&app, post("/api/chat", &body.to_string())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("API key"));
}

#[tokio::test]
async fn chat_with_unsafe_path_is_server_error() {
    let project = tempfile::tempdir().unwrap();
    let app = app(project.path(), vec![reply("x", &[("next.config.js", "{}")])], None);

    let body = json!({ "messages": [{ "role": "user", "content": "tune config" }] });
    let (status, body) = send(&app, post("/api/chat", &body.to_string())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("Unsafe file paths blocked"));
}

#[tokio::test]
async fn rollback_validates_and_restores() {
    let project = tempfile::tempdir().unwrap();
    let app = app(
        project.path(),
        vec![reply("one", &[("lib/a.ts", "1")]), reply("two", &[("lib/a.ts", "2")])],
        None
    );
    let ask = json!({ "messages": [{ "role": "user", "content": "edit a" }] }).to_string();

    let (status, body) = send(&app, post("/api/rollback", "{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "versionId is required.");

    let (status, _) = send(&app, post("/api/rollback", r#"{"versionId": "999"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    send(&app, post("/api/chat", &ask)).await;
    let (_, listing) = send(&app, get("/api/versions")).await;
    let first = listing["current"].as_str().unwrap().to_string();
    send(&app, post("/api/chat", &ask)).await;
    assert_eq!(std::fs::read_to_string(project.path().join("lib/a.ts")).unwrap(), "2");

    let rollback = json!({ "versionId": first }).to_string();
    let (status, body) = send(&app, post("/api/rollback", &rollback)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["version"]["id"], first.as_str());
    assert_eq!(std::fs::read_to_string(project.path().join("lib/a.ts")).unwrap(), "1");

    let (_, listing) = send(&app, get("/api/versions")).await;
    assert_eq!(listing["current"], first.as_str());
    assert_eq!(listing["versions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn versions_on_fresh_project_are_empty() {
    let project = tempfile::tempdir().unwrap();
    let app = app(project.path(), vec![], None);

    let (status, body) = send(&app, get("/api/versions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "versions": [], "current": "" }));
}

#[tokio::test]
async fn api_key_is_enforced_when_configured() {
    let project = tempfile::tempdir().unwrap();
    let app = app(project.path(), vec![], Some("s3cret"));

    let (status, body) = send(&app, get("/api/versions")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let req = Request::builder()
        .uri("/api/versions")
        .header("X-API-Key", "wrong")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/versions")
        .header("X-API-Key", "s3cret")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);

    assert_eq!(send(&app, get("/api/versions?api_key=s3cret")).await.0, StatusCode::OK);
}

#[tokio::test]
async fn rollback_of_unsafe_record_is_bad_request() {
    let project = tempfile::tempdir().unwrap();
    let assistant = Arc::new(
        assistant(project.path(), ScriptedChat::new(vec![]), ScriptedCheck::new(vec![]))
    );
    let mut files = std::collections::BTreeMap::new();
    files.insert("package.json".to_string(), "{}".to_string());
    let version = assistant.store().save("tampered", &files).await.unwrap();
    let app = router(assistant, None);

    let body = json!({ "versionId": version.id }).to_string();
    let (status, body) = send(&app, post("/api/rollback", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("package.json"));
    assert!(!project.path().join("package.json").exists());
}
