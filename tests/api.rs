//! HTTP API end to end: the router served on an ephemeral port, with
//! completions answered by a scripted client.

mod common;

use serde_json::{json, Value};
use std::sync::Arc;

use blogforge::server::router;
use blogforge_core::testing::ScriptedClient;
use common::{app, prose, DIMS};

const OUTLINE: &str = r#"{"title": "Apex REST Services", "hook": "Ship an API from Salesforce.", "sections": [{"title": "Setup", "points": ["@RestResource"]}, {"title": "Endpoints"}, {"title": "Testing"}], "seo_keywords": ["apex rest"]}"#;

fn draft_reply() -> String {
    let body = format!("# Apex REST Services\n\n{}", "apex rest endpoint callout words ".repeat(40));
    json!({ "title": "Apex REST Services", "content": body }).to_string()
}

fn review_reply(score: u8, needs_revision: bool) -> String {
    json!({
        "quality_score": score,
        "needs_revision": needs_revision,
        "feedback": "clear and complete"
    })
    .to_string()
}

const SEO: &str = r#"{"meta_description": "Build Apex REST services step by step.", "title_suggestions": ["Apex REST in practice"], "suggestions": [{"type": "keyword", "message": "Use the keyword in the first paragraph", "priority": "high"}]}"#;

struct Server {
    base: String,
    http: reqwest::Client,
    _tmp: tempfile::TempDir,
}

impl Server {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.http.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self.http.post(self.url(path)).json(&body).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn delete(&self, path: &str) -> (u16, Value) {
        let resp = self.http.delete(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

async fn serve(client: Arc<ScriptedClient>) -> Server {
    let (tmp, ctx) = app(client).await;
    let app = router(Arc::new(ctx));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Server {
        base: format!("http://{}", addr),
        http: reqwest::Client::new(),
        _tmp: tmp,
    }
}

#[tokio::test]
async fn test_health() {
    let server = serve(Arc::new(ScriptedClient::new(DIMS))).await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_validation_errors_are_400() {
    let server = serve(Arc::new(ScriptedClient::new(DIMS))).await;

    let (status, body) = server.post("/api/v1/outline", json!({ "topic": "ab" })).await;
    assert_eq!(status, 400);
    assert_eq!(body["kind"], "invalid_request");
    assert!(body["message"].as_str().unwrap().contains("topic"));

    let (status, body) = server.post("/api/v1/draft", json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["kind"], "invalid_request");

    // Missing required field: rejected before reaching the handler.
    let (status, body) = server.post("/api/v1/research", json!({ "niche": "salesforce" })).await;
    assert_eq!(status, 400);
    assert_eq!(body["kind"], "invalid_request");
}

#[tokio::test]
async fn test_missing_ids_are_404() {
    let server = serve(Arc::new(ScriptedClient::new(DIMS))).await;

    for path in [
        "/api/v1/research/nope",
        "/api/v1/content/nope",
        "/api/v1/knowledge/nope",
    ] {
        let (status, body) = server.get(path).await;
        assert_eq!(status, 404, "{}", path);
        assert_eq!(body["kind"], "not_found");
    }

    let (status, _) = server.delete("/api/v1/knowledge/nope").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_workflow_status() {
    let server = serve(Arc::new(ScriptedClient::new(DIMS))).await;
    let (status, body) = server.get("/api/v1/workflow/status").await;
    assert_eq!(status, 200);
    assert_eq!(body["service"], "blog_workflow");
    assert_eq!(body["status"], "available");
    assert!(!body["steps"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_knowledge_then_research() {
    let server = serve(Arc::new(ScriptedClient::new(DIMS))).await;

    let (status, upload) = server
        .post(
            "/api/v1/knowledge/upload",
            json!({
                "title": "Apex governor limits",
                "content": prose(3000),
                "document_type": "guide",
                "owner": "ana"
            }),
        )
        .await;
    assert_eq!(status, 200, "{}", upload);
    let document_id = upload["document_id"].as_str().unwrap().to_string();
    assert!(upload["chunks_created"].as_u64().unwrap() >= 3);

    let (status, found) = server
        .post(
            "/api/v1/knowledge/search",
            json!({ "query": "apex governor limits", "top_k": 2 }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(found["results"].as_array().unwrap().len(), 2);

    let (status, listed) = server.get("/api/v1/knowledge?owner=ana").await;
    assert_eq!(status, 200);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, research) = server
        .post(
            "/api/v1/research",
            json!({ "topic": "apex governor limits", "depth": "shallow", "owner": "ana" }),
        )
        .await;
    assert_eq!(status, 200, "{}", research);
    assert!(!research["findings"].as_array().unwrap().is_empty());

    let id = research["id"].as_str().unwrap();
    let (status, stored) = server.get(&format!("/api/v1/research/{}", id)).await;
    assert_eq!(status, 200);
    assert_eq!(stored["topic"], "apex governor limits");

    let (status, deleted) = server
        .delete(&format!("/api/v1/knowledge/{}", document_id))
        .await;
    assert_eq!(status, 200);
    assert_eq!(deleted["vectors_removed"], upload["chunks_created"]);
}

#[tokio::test]
async fn test_outline_then_draft_from_outline() {
    let client = Arc::new(ScriptedClient::new(DIMS).with_replies([OUTLINE.to_string(), draft_reply()]));
    let server = serve(client.clone()).await;

    let (status, outline) = server
        .post(
            "/api/v1/outline",
            json!({ "topic": "Building REST APIs with Apex", "use_research": false }),
        )
        .await;
    assert_eq!(status, 200, "{}", outline);
    assert_eq!(outline["title"], "Apex REST Services");
    let outline_id = outline["id"].as_str().unwrap();

    let (status, draft) = server
        .post(
            "/api/v1/draft",
            json!({ "outline_id": outline_id, "use_research": false, "word_count": 1000 }),
        )
        .await;
    assert_eq!(status, 200, "{}", draft);
    assert!(draft["word_count"].as_u64().unwrap() > 100);
    assert_eq!(client.remaining_replies(), 0);

    // The draft prompt carries the stored outline.
    let prompts: Vec<_> = client.requests().into_iter().map(|r| r.prompt).collect();
    assert!(prompts[1].contains("Testing"));

    let (status, record) = server
        .get(&format!("/api/v1/content/{}", draft["id"].as_str().unwrap()))
        .await;
    assert_eq!(status, 200);
    assert_eq!(record["kind"], "draft");

    let (status, listed) = server.get("/api/v1/content").await;
    assert_eq!(status, 200);
    assert_eq!(listed.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_draft_rejects_non_outline_record() {
    let client = Arc::new(ScriptedClient::new(DIMS).with_replies([OUTLINE.to_string(), draft_reply()]));
    let server = serve(client).await;

    let (_, outline) = server
        .post(
            "/api/v1/outline",
            json!({ "topic": "Building REST APIs with Apex", "use_research": false }),
        )
        .await;
    let (_, draft) = server
        .post(
            "/api/v1/draft",
            json!({ "outline_id": outline["id"], "use_research": false }),
        )
        .await;

    let (status, body) = server
        .post(
            "/api/v1/draft",
            json!({ "outline_id": draft["id"], "use_research": false }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["kind"], "invalid_request");
}

#[tokio::test]
async fn test_blog_workflow_completes_and_is_stored() {
    let client = Arc::new(ScriptedClient::new(DIMS).with_replies([
        OUTLINE.to_string(),
        draft_reply(),
        review_reply(9, false),
        SEO.to_string(),
    ]));
    let server = serve(client.clone()).await;

    let (status, state) = server
        .post(
            "/api/v1/workflow/blog",
            json!({ "topic": "Building REST APIs with Apex", "owner": "ana" }),
        )
        .await;
    assert_eq!(status, 200, "{}", state);
    assert_eq!(state["status"], "complete");
    assert_eq!(state["revision_count"], 0);
    assert_eq!(state["review_score"], 9);
    assert!(state["seo"].is_object());
    assert_eq!(client.remaining_replies(), 0);

    let id = state["id"].as_str().unwrap();
    let (status, record) = server.get(&format!("/api/v1/content/{}", id)).await;
    assert_eq!(status, 200);
    assert_eq!(record["kind"], "workflow");
    assert_eq!(record["owner"], "ana");
    assert_eq!(record["title"], "Apex REST Services");

    let research_id = state["research_id"].as_str().unwrap();
    let (status, _) = server.get(&format!("/api/v1/research/{}", research_id)).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_blog_workflow_failure_carries_step_and_state() {
    let client = Arc::new(ScriptedClient::new(DIMS).with_replies([
        OUTLINE.to_string(),
        draft_reply(),
        "no json here".to_string(),
        "still no json".to_string(),
    ]));
    let server = serve(client).await;

    let (status, body) = server
        .post(
            "/api/v1/workflow/blog",
            json!({ "topic": "Building REST APIs with Apex" }),
        )
        .await;
    assert_eq!(status, 502);
    assert_eq!(body["kind"], "schema_validation_error");
    assert_eq!(body["step"], "reviewing");
    assert_eq!(body["state"]["status"], "failed");
    assert!(body["state"]["draft"].is_object());

    // Failed runs are not stored.
    let (_, listed) = server.get("/api/v1/content").await;
    assert!(listed.as_array().unwrap().is_empty());
}
