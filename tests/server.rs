use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use ze_cookbook::client::HttpSearchClient;
use ze_cookbook::server::build_router;
use ze_cookbook::tools::ToolRegistry;

/// Start the app on an ephemeral port against `backend`; returns its base URL.
async fn start_app(backend: &MockServer, default_collection: Option<&str>) -> String {
    let client =
        HttpSearchClient::new(&backend.uri(), Some("server-key"), Duration::from_secs(5)).unwrap();
    let app = build_router(
        client,
        default_collection.map(str::to_string),
        Arc::new(ToolRegistry::with_builtins()),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health() {
    let backend = MockServer::start().await;
    let base = start_app(&backend, None).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_tools_list() {
    let backend = MockServer::start().await;
    let base = start_app(&backend, None).await;

    let body: Value = reqwest::get(format!("{}/tools/list", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tools = body["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 9);
    assert_eq!(tools[0]["name"], "search");
    assert_eq!(tools[0]["builtin"], true);
    assert_eq!(tools[0]["parameters"]["required"], json!(["query"]));
}

#[tokio::test]
async fn test_search_without_collection_is_bad_request() {
    let backend = MockServer::start().await;
    let base = start_app(&backend, None).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/tools/search", base))
        .json(&json!({ "query": "apples" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("X-Collection-Name"));
}

#[tokio::test]
async fn test_search_forwards_headers_and_dedupes() {
    let backend = MockServer::start().await;
    Mock::given(path("/queries/top-snippets"))
        .and(header("authorization", "Bearer caller-key"))
        .and(body_partial_json(json!({ "collection_name": "research", "k": 15 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "document_results": [
                { "path": "a.pdf", "score": 0.9, "file_url": "https://files.example/a.pdf" },
                { "path": "b.txt", "score": 0.4, "file_url": "https://files.example/b.txt" }
            ],
            "results": [
                { "path": "a.pdf", "content": "first", "score": 0.9 },
                { "path": "a.pdf", "content": "second", "score": 0.8 },
                { "path": "b.txt", "content": "third", "score": 0.4 }
            ]
        })))
        .expect(1)
        .mount(&backend)
        .await;

    let base = start_app(&backend, None).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/tools/search", base))
        .header("X-Collection-Name", "research")
        .header("Authorization", "Bearer caller-key")
        .json(&json!({ "query": "apples" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    let results = body["result"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0],
        json!({
            "id": "a.pdf",
            "title": "a.pdf",
            "text": "first",
            "url": "https://files.example/a.pdf"
        })
    );
    assert_eq!(results[1]["id"], "b.txt");
}

#[tokio::test]
async fn test_default_collection_and_server_key() {
    let backend = MockServer::start().await;
    Mock::given(path("/documents/get-document-info"))
        .and(header("authorization", "Bearer server-key"))
        .and(body_partial_json(json!({ "collection_name": "fallback", "path": "doc.txt" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "document": { "path": "doc.txt", "content": "hello", "file_url": null }
        })))
        .expect(1)
        .mount(&backend)
        .await;

    let base = start_app(&backend, Some("fallback")).await;
    let body: Value = reqwest::Client::new()
        .post(format!("{}/tools/fetch", base))
        .json(&json!({ "id": "doc.txt" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["result"]["text"], "hello");
    assert!(body["result"]["url"].is_null());
}

#[tokio::test]
async fn test_fetch_empty_id_is_bad_request() {
    let backend = MockServer::start().await;
    let base = start_app(&backend, Some("c")).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/tools/fetch", base))
        .json(&json!({ "id": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_fetch_unknown_document_is_not_found() {
    let backend = MockServer::start().await;
    Mock::given(path("/documents/get-document-info"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such document"))
        .mount(&backend)
        .await;

    let base = start_app(&backend, Some("c")).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/tools/fetch", base))
        .json(&json!({ "id": "missing.txt" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_unknown_tool_and_missing_param() {
    let backend = MockServer::start().await;
    let base = start_app(&backend, Some("c")).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/tools/nope", base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .post(format!("{}/tools/get_page_info", base))
        .json(&json!({ "path": "a.pdf" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("page_index"));
}

#[tokio::test]
async fn test_mcp_endpoint_accepts_initialize() {
    let backend = MockServer::start().await;
    let base = start_app(&backend, None).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/mcp", base))
        .header("Accept", "application/json, text/event-stream")
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": { "name": "integration-test", "version": "0.0.0" }
            }
        }))
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success(), "status {}", resp.status());
    assert!(resp.headers().contains_key("mcp-session-id"));
}
