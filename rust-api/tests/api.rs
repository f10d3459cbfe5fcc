//! HTTP-level tests driving the full router with `tower::ServiceExt::oneshot`.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use common::{temp_store, test_config, SECRET};
use msgsink::web::{compute_signature, SIGNATURE_HEADER};
use msgsink::{router, AppState, MessageStore};

struct TestApp {
    app: Router,
    store: MessageStore,
    _dir: TempDir,
}

impl TestApp {
    async fn new(secret: Option<&str>) -> Self {
        let (store, dir) = temp_store().await;
        let app = router(AppState::new(test_config(secret), store.clone()));
        Self {
            app,
            store,
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.expect("response")
    }

    async fn post_webhook(&self, body: &str, signature: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/webhook")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    async fn post_signed(&self, payload: &Value) -> Response {
        let body = payload.to_string();
        let sig = compute_signature(SECRET, body.as_bytes()).expect("signature");
        self.post_webhook(&body, Some(&sig)).await
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

fn payload(id: &str, from: &str, ts: &str, text: &str) -> Value {
    json!({"message_id": id, "from": from, "to": "+999", "ts": ts, "text": text})
}

#[tokio::test]
async fn test_webhook_then_replay_then_list() {
    let t = TestApp::new(Some(SECRET)).await;
    let msg = json!({
        "message_id": "m1",
        "from": "+111",
        "to": "+999",
        "ts": "2024-01-01T10:00:00Z",
        "text": "hi"
    });

    let first = t.post_signed(&msg).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(json_body(first).await, json!({"status": "ok"}));

    let replay = t.post_signed(&msg).await;
    assert_eq!(replay.status(), StatusCode::OK);
    assert_eq!(json_body(replay).await, json!({"status": "ok"}));

    let list = t.get("/messages").await;
    assert_eq!(list.status(), StatusCode::OK);
    let body = json_body(list).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["limit"], 50);
    assert_eq!(body["offset"], 0);
    assert_eq!(
        body["data"][0],
        json!({
            "message_id": "m1",
            "from": "+111",
            "to": "+999",
            "ts": "2024-01-01T10:00:00Z",
            "text": "hi"
        })
    );
}

#[tokio::test]
async fn test_webhook_invalid_signature() {
    let t = TestApp::new(Some(SECRET)).await;
    let body = payload("m2", "+111", "2024-01-01T10:00:00Z", "Hello").to_string();

    let response = t.post_webhook(&body, Some("invalid")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await, json!({"detail": "invalid signature"}));
}

#[tokio::test]
async fn test_webhook_missing_signature() {
    let t = TestApp::new(Some(SECRET)).await;
    let body = payload("m3", "+111", "2024-01-01T10:00:00Z", "Hello").to_string();

    let response = t.post_webhook(&body, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await, json!({"detail": "invalid signature"}));
}

#[tokio::test]
async fn test_webhook_validation_error() {
    let t = TestApp::new(Some(SECRET)).await;
    let bad = json!({
        "message_id": "",
        "from": "invalid",
        "to": "+14155550100",
        "ts": "invalid-date"
    });

    let response = t.post_signed(&bad).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = json_body(response).await;
    let fields: Vec<&str> = body["detail"]
        .as_array()
        .expect("detail array")
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["message_id", "from", "ts"]);
}

#[tokio::test]
async fn test_webhook_empty_message_id() {
    let t = TestApp::new(Some(SECRET)).await;
    let response = t
        .post_signed(&payload("", "+111", "2024-01-01T10:00:00Z", "hi"))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_webhook_without_secret_is_503() {
    let t = TestApp::new(None).await;
    let response = t
        .post_webhook(&payload("m1", "+1", "2024-01-01T10:00:00Z", "x").to_string(), Some("abc"))
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_signature_covers_raw_bytes() {
    let t = TestApp::new(Some(SECRET)).await;
    // Whitespace that a re-serialization would drop is still part of the signed body.
    let body = "{ \"message_id\": \"ws\", \"from\": \"+1\", \"to\": \"+2\", \"ts\": \"2024-01-01T10:00:00Z\" }";
    let sig = compute_signature(SECRET, body.as_bytes()).unwrap();

    let response = t.post_webhook(body, Some(&sig)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(t.store.get("ws").await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_webhooks_same_id() {
    let t = TestApp::new(Some(SECRET)).await;
    let body = payload("dup", "+111", "2024-01-01T10:00:00Z", "race").to_string();
    let sig = compute_signature(SECRET, body.as_bytes()).expect("signature");

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let app = t.app.clone();
            let request = Request::builder()
                .method(Method::POST)
                .uri("/webhook")
                .header(header::CONTENT_TYPE, "application/json")
                .header(SIGNATURE_HEADER, sig.as_str())
                .body(Body::from(body.clone()))
                .expect("request");
            tokio::spawn(async move { app.oneshot(request).await.expect("response") })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        assert_eq!(result.expect("task").status(), StatusCode::OK);
    }

    let body = json_body(t.get("/messages").await).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_out_of_range_year_rejected_and_reads_still_work() {
    let t = TestApp::new(Some(SECRET)).await;
    let ok = payload("y1", "+111", "2024-01-01T10:00:00Z", "fine");
    assert_eq!(t.post_signed(&ok).await.status(), StatusCode::OK);

    let far = payload("y2", "+111", "+10000-01-01T00:00:00", "far");
    let response = t.post_signed(&far).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let detail = json_body(response).await;
    assert_eq!(detail["detail"][0]["field"], "ts");

    let list = t.get("/messages").await;
    assert_eq!(list.status(), StatusCode::OK);
    assert_eq!(json_body(list).await["total"], 1);

    let stats = t.get("/stats").await;
    assert_eq!(stats.status(), StatusCode::OK);
    assert_eq!(json_body(stats).await["last_message_ts"], "2024-01-01T10:00:00Z");
}

#[tokio::test]
async fn test_webhook_wrong_field_types() {
    let t = TestApp::new(Some(SECRET)).await;
    let bad = json!({"message_id": 42, "from": "bad", "to": "+1", "ts": "x"});

    let response = t.post_signed(&bad).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = json_body(response).await;
    let fields: Vec<&str> = body["detail"]
        .as_array()
        .expect("detail array")
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["message_id", "from", "ts"]);
    assert_eq!(body["detail"][0]["message"], "must be a string");
}

#[tokio::test]
async fn test_messages_filtering_and_search() {
    let t = TestApp::new(Some(SECRET)).await;
    for msg in [
        payload("msg1", "+111", "2024-01-01T10:00:00Z", "Alpha"),
        payload("msg2", "+222", "2024-01-02T10:00:00Z", "Beta"),
        payload("msg3", "+111", "2024-01-03T10:00:00Z", "Charlie"),
    ] {
        assert_eq!(t.post_signed(&msg).await.status(), StatusCode::OK);
    }

    let body = json_body(t.get("/messages").await).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let body = json_body(t.get("/messages?from=%2B111").await).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["data"][0]["message_id"], "msg1");

    // An unencoded `+` decodes to a space and is still understood.
    let body = json_body(t.get("/messages?from=+111").await).await;
    assert_eq!(body["total"], 2);

    let body = json_body(t.get("/messages?q=Beta").await).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["message_id"], "msg2");

    let body = json_body(t.get("/messages?since=2024-01-02T10:00:00Z").await).await;
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn test_messages_pagination() {
    let t = TestApp::new(Some(SECRET)).await;
    for i in 0..5 {
        let msg = payload(&format!("p{i}"), "+1", &format!("2024-01-0{}T10:00:00Z", i + 1), "x");
        t.post_signed(&msg).await;
    }

    let body = json_body(t.get("/messages?limit=2&offset=2").await).await;
    assert_eq!(body["total"], 5);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["offset"], 2);
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["p2", "p3"]);
}

#[tokio::test]
async fn test_messages_rejects_out_of_range_paging() {
    let t = TestApp::new(Some(SECRET)).await;

    for uri in [
        "/messages?limit=0",
        "/messages?limit=101",
        "/messages?offset=-1",
        "/messages?limit=abc",
    ] {
        let response = t.get(uri).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
    }
}

#[tokio::test]
async fn test_stats() {
    let t = TestApp::new(Some(SECRET)).await;
    for msg in [
        payload("s1", "+100", "2024-01-01T10:00:00Z", "A"),
        payload("s2", "+100", "2024-01-02T10:00:00Z", "B"),
        payload("s3", "+200", "2024-01-03T10:00:00Z", "C"),
    ] {
        t.post_signed(&msg).await;
    }

    let response = t.get("/stats").await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = json_body(response).await;

    assert_eq!(stats["total_messages"], 3);
    assert_eq!(stats["senders_count"], 2);
    assert_eq!(stats["messages_per_sender"][0], json!({"from": "+100", "count": 2}));
    assert_eq!(stats["first_message_ts"], "2024-01-01T10:00:00Z");
    assert_eq!(stats["last_message_ts"], "2024-01-03T10:00:00Z");
}

#[tokio::test]
async fn test_stats_empty() {
    let t = TestApp::new(Some(SECRET)).await;
    let stats = json_body(t.get("/stats").await).await;

    assert_eq!(
        stats,
        json!({
            "total_messages": 0,
            "senders_count": 0,
            "messages_per_sender": [],
            "first_message_ts": null,
            "last_message_ts": null
        })
    );
}

#[tokio::test]
async fn test_health_and_metrics() {
    let t = TestApp::new(Some(SECRET)).await;

    let live = t.get("/health/live").await;
    assert_eq!(live.status(), StatusCode::OK);
    assert_eq!(json_body(live).await, json!({"status": "ok"}));

    let ready = t.get("/health/ready").await;
    assert_eq!(ready.status(), StatusCode::OK);

    let metrics = t.get("/metrics").await;
    assert_eq!(metrics.status(), StatusCode::OK);
    let bytes = metrics.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("http_requests_total"));
}

#[tokio::test]
async fn test_ready_without_secret() {
    let t = TestApp::new(None).await;

    assert_eq!(t.get("/health/live").await.status(), StatusCode::OK);
    assert_eq!(
        t.get("/health/ready").await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn test_ready_with_closed_store() {
    let t = TestApp::new(Some(SECRET)).await;
    t.store.close().await;

    assert_eq!(
        t.get("/health/ready").await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn test_root_redirects_to_messages() {
    let t = TestApp::new(Some(SECRET)).await;
    let response = t.get("/").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/messages");
}
