mod common;

use axum::http::{
    HeaderName, HeaderValue, Method, StatusCode,
    header::{ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN, VARY},
};
use serde_json::{Value, json};
use server::{config::Config, database::DocumentStore, memory::MemoryStore};
use std::sync::Arc;

use common::{PROGRESSIVE, RESPONSES, document, memory_server, server_with, storeless_server};

async fn seed_progressive(store: &MemoryStore, session: &str, question: u8, answer: &str, complete: bool) {
    let id = format!("{session}-{question}");
    let fields = document(json!({
        "id": id,
        "session_id": session,
        "question_number": question,
        "answer": answer,
        "is_complete": complete,
        "timestamp": format!("2025-01-01T12:00:0{question}.000000Z"),
    }));

    store.create(PROGRESSIVE, &id, fields).await.unwrap();
}

fn header(response: &axum_test::TestResponse, name: HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn health_is_plain_ok() {
    let server = storeless_server();

    let response = server.get("/").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "OK");
}

#[tokio::test]
async fn responses_newest_first() {
    let (server, store) = memory_server();

    for (id, ts) in [("old", "2025-01-01T10:00:00Z"), ("new", "2025-01-02T10:00:00Z")] {
        let fields = document(json!({
            "ts": ts,
            "session_id": format!("s-{id}"),
            "q1": "a",
            "ua": "x".repeat(150),
        }));
        store.create(RESPONSES, id, fields).await.unwrap();
    }
    store
        .create(RESPONSES, "untimed", document(json!({"q1": "b"})))
        .await
        .unwrap();

    let response = server.get("/responses").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["ok"], true);
    assert_eq!(body["count"], 2);

    let entries = body["responses"].as_array().unwrap();
    assert_eq!(entries[0]["id"], "new");
    assert_eq!(entries[1]["id"], "old");

    assert_eq!(entries[0]["answers"]["q1"], "a");
    assert_eq!(entries[0]["answers"]["q6"], Value::Null);
    assert_eq!(entries[0]["metadata"]["is_complete"], true);
    assert_eq!(
        entries[0]["metadata"]["user_agent"].as_str().map(|ua| ua.chars().count()),
        Some(100)
    );
}

#[tokio::test]
async fn progressive_responses_newest_first() {
    let (server, store) = memory_server();

    seed_progressive(&store, "s1", 1, "sempre", false).await;
    seed_progressive(&store, "s1", 2, "nunca", false).await;

    let body: Value = server.get("/progressive-responses").await.json();

    assert_eq!(body["count"], 2);
    assert_eq!(body["responses"][0]["question_number"], 2);
    assert_eq!(body["responses"][0]["answer"], "nunca");
    assert_eq!(body["responses"][1]["question_number"], 1);
    assert_eq!(body["responses"][1]["is_complete"], false);
}

#[tokio::test]
async fn collected_submissions_are_listed() {
    let (server, _) = memory_server();

    server
        .post("/collect")
        .add_header(
            HeaderName::from_static("user-agent"),
            HeaderValue::from_static("banner-test"),
        )
        .json(&json!({
            "q1": "a", "q2": "b", "q3": "c", "q4": "d", "q5": "e", "q6": "f",
            "session_id": "s1",
            "campaign_id": "camp"
        }))
        .await;

    let body: Value = server.get("/responses").await.json();

    assert_eq!(body["count"], 1);

    let entry = &body["responses"][0];
    assert_eq!(entry["session_id"], "s1");
    assert_eq!(entry["campaign_id"], "camp");
    assert_eq!(entry["answers"]["q6"], "f");
    assert_eq!(entry["metadata"]["user_agent"], "banner-test");
}

#[tokio::test]
async fn analytics_empty() {
    let (server, _) = memory_server();

    let response = server.get("/analytics").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["ok"], true);
    assert_eq!(body["analytics"]["total_sessions"], 0);
    assert_eq!(body["analytics"]["completion_rate"], 0.0);
    assert_eq!(body["analytics"]["drop_off_by_question"]["1"]["drop_off_rate"], 0.0);
}

#[tokio::test]
async fn analytics_over_collected_sessions() {
    let (server, _) = memory_server();

    for question in 1..=6 {
        let mut body = json!({
            "session_id": "done",
            "question_number": question,
            "answer": "sempre",
        });
        if question == 6 {
            body["is_complete"] = json!(true);
            body["all_answers"] = json!({"q1": "sempre", "q6": "sempre"});
        }

        server.post("/collect").json(&body).await;
    }
    server
        .post("/collect")
        .json(&json!({"session_id": "gone", "question_number": 1, "answer": "nunca"}))
        .await;

    let analytics = server.get("/analytics").await.json::<Value>()["analytics"].clone();

    assert_eq!(analytics["total_sessions"], 2);
    assert_eq!(analytics["completed_sessions"], 1);
    assert_eq!(analytics["completion_rate"], 50.0);
    assert_eq!(analytics["drop_off_by_question"]["1"]["answered"], 2);
    assert_eq!(analytics["drop_off_by_question"]["2"]["drop_off_rate"], 50.0);
    assert_eq!(analytics["question_statistics"]["1"]["total"], 2);
    assert_eq!(analytics["question_statistics"]["1"]["answers"]["nunca"], 1);
}

#[tokio::test]
async fn completion_without_answers_is_not_counted() {
    let (server, store) = memory_server();

    let response = server
        .post("/collect")
        .json(&json!({"session_id": "s1", "question_number": 6, "answer": "f", "is_complete": true}))
        .await;
    assert_eq!(response.json::<Value>()["stored"], "firestore");

    let analytics = server.get("/analytics").await.json::<Value>()["analytics"].clone();

    assert!(store.is_empty(RESPONSES));
    assert_eq!(analytics["total_sessions"], 1);
    assert_eq!(analytics["completed_sessions"], 0);
    assert_eq!(analytics["completion_rate"], 0.0);
}

#[tokio::test]
async fn cleanup_removes_only_test_sessions() {
    let (server, store) = memory_server();

    for (id, session) in [("r1", "test_a"), ("r2", "test_b"), ("r3", "real"), ("r4", "testing")] {
        store
            .create(RESPONSES, id, document(json!({"session_id": session})))
            .await
            .unwrap();
    }
    seed_progressive(&store, "test_a", 1, "a", false).await;
    seed_progressive(&store, "real", 1, "a", false).await;

    let response = server.delete("/cleanup-test-sessions").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["ok"], true);
    assert_eq!(body["deleted"], json!({"responses": 2, "progressive": 1, "total": 3}));

    let remaining: Vec<String> = store.documents(RESPONSES).into_iter().map(|d| d.id).collect();
    assert_eq!(remaining, ["r3", "r4"]);
    assert_eq!(store.documents(PROGRESSIVE)[0].id, "real-1");

    let again: Value = server.delete("/cleanup-test-sessions").await.json();
    assert_eq!(again["deleted"]["total"], 0);
}

#[tokio::test]
async fn read_endpoints_need_a_store() {
    let server = storeless_server();

    for response in [
        server.get("/responses").await,
        server.get("/progressive-responses").await,
        server.get("/analytics").await,
        server.delete("/cleanup-test-sessions").await,
    ] {
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.json::<Value>(),
            json!({"ok": false, "error": "firestore_not_available"})
        );
    }
}

#[tokio::test]
async fn cors_echoes_any_origin_by_default() {
    let server = storeless_server();

    let response = server
        .get("/")
        .add_header(ORIGIN, HeaderValue::from_static("https://ads.example.com"))
        .await;

    assert_eq!(
        header(&response, ACCESS_CONTROL_ALLOW_ORIGIN).as_deref(),
        Some("https://ads.example.com")
    );
    assert_eq!(header(&response, VARY).as_deref(), Some("Origin"));
    assert_eq!(
        header(&response, ACCESS_CONTROL_ALLOW_METHODS).as_deref(),
        Some("GET, POST, DELETE, OPTIONS")
    );

    let response = server.get("/").await;
    assert_eq!(header(&response, ACCESS_CONTROL_ALLOW_ORIGIN).as_deref(), Some("*"));
}

#[tokio::test]
async fn cors_falls_back_to_first_allowed_origin() {
    let config = Config {
        allowed_origins: vec!["https://a.example".into(), "https://b.example".into()],
        ..Config::default()
    };
    let server = server_with(config, Some(Arc::new(MemoryStore::new())));

    let response = server
        .get("/")
        .add_header(ORIGIN, HeaderValue::from_static("https://b.example"))
        .await;
    assert_eq!(
        header(&response, ACCESS_CONTROL_ALLOW_ORIGIN).as_deref(),
        Some("https://b.example")
    );

    let response = server
        .get("/")
        .add_header(ORIGIN, HeaderValue::from_static("https://evil.example"))
        .await;
    assert_eq!(
        header(&response, ACCESS_CONTROL_ALLOW_ORIGIN).as_deref(),
        Some("https://a.example")
    );
}

#[tokio::test]
async fn errors_carry_cors_headers() {
    let server = storeless_server();

    let response = server
        .post("/collect")
        .add_header(ORIGIN, HeaderValue::from_static("https://ads.example.com"))
        .json(&json!({}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        header(&response, ACCESS_CONTROL_ALLOW_ORIGIN).as_deref(),
        Some("https://ads.example.com")
    );
}

#[tokio::test]
async fn preflight_is_no_content() {
    let server = storeless_server();

    for path in ["/collect", "/cleanup-test-sessions"] {
        let response = server
            .method(Method::OPTIONS, path)
            .add_header(ORIGIN, HeaderValue::from_static("https://ads.example.com"))
            .await;

        assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
        assert!(response.text().is_empty());
        assert_eq!(
            header(&response, ACCESS_CONTROL_ALLOW_ORIGIN).as_deref(),
            Some("https://ads.example.com")
        );
    }
}
