use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use server::{
    app,
    config::Config,
    fact::VotePolicy,
    memory::MemoryStore,
    state::State,
    store::StorageStatus,
};

fn router(policy: VotePolicy) -> Router {
    let config = Config {
        vote_policy: policy,
        ..Config::default()
    };

    app(State::with_store(config, Arc::new(MemoryStore::new(policy))))
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, body)
}

async fn publish(router: &Router, content: &str) -> Value {
    let (status, fact) = send(router, Method::POST, "/fact", Some(json!({ "content": content }))).await;
    assert_eq!(status, StatusCode::CREATED);
    fact
}

async fn vote(router: &Router, id: &str, voter: &str, choice: &str) -> (StatusCode, Value) {
    send(
        router,
        Method::PATCH,
        &format!("/fact/{id}/vote"),
        Some(json!({ "choice": choice, "voterId": voter })),
    )
    .await
}

#[tokio::test]
async fn test_current_before_anything_is_published() {
    let router = router(VotePolicy::AllowChange);

    let (status, body) = send(&router, Method::GET, "/fact/current", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_publish_and_fetch_current() {
    let router = router(VotePolicy::AllowChange);

    publish(&router, "Bananas are berries").await;
    let latest = publish(&router, "Strawberries are not").await;

    let (status, current) = send(&router, Method::GET, "/fact/current", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["id"], latest["id"]);
    assert_eq!(current["content"], "Strawberries are not");
    assert_eq!(current["agrees"], 0);
    assert_eq!(current["disagrees"], 0);
    assert!(current["publishedAt"].is_string());
    assert!(current.get("voters").is_none());
}

#[tokio::test]
async fn test_publish_rejects_empty_content() {
    let router = router(VotePolicy::AllowChange);

    for body in [json!({ "content": "   " }), json!({}), json!({ "content": 7 })] {
        let (status, err) = send(&router, Method::POST, "/fact", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "validation");
    }

    let (status, _) = send(&router, Method::GET, "/fact/current", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_vote_flow() {
    let router = router(VotePolicy::AllowChange);
    let fact = publish(&router, "Cows have best friends").await;
    let id = fact["id"].as_str().unwrap();

    let (status, updated) = vote(&router, id, "alice", "agree").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["agrees"], 1);

    let (status, updated) = vote(&router, id, "bob", "disagree").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!((updated["agrees"].clone(), updated["disagrees"].clone()), (json!(1), json!(1)));

    let (status, fetched) = send(&router, Method::GET, &format!("/fact/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn test_duplicate_vote_reports_previous_choice() {
    let router = router(VotePolicy::AllowChange);
    let fact = publish(&router, "Sloths can hold their breath").await;
    let id = fact["id"].as_str().unwrap();

    vote(&router, id, "alice", "disagree").await;
    let (status, err) = vote(&router, id, "alice", "disagree").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "duplicate_vote");
    assert_eq!(err["previousChoice"], "disagree");

    let (_, fetched) = send(&router, Method::GET, &format!("/fact/{id}"), None).await;
    assert_eq!(fetched["disagrees"], 1);
}

#[tokio::test]
async fn test_vote_change_under_change_policy() {
    let router = router(VotePolicy::AllowChange);
    let fact = publish(&router, "Glass is a liquid").await;
    let id = fact["id"].as_str().unwrap();

    vote(&router, id, "alice", "agree").await;
    let (status, updated) = vote(&router, id, "alice", "disagree").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["agrees"], 0);
    assert_eq!(updated["disagrees"], 1);

    let (status, recorded) = send(&router, Method::GET, &format!("/fact/{id}/vote/alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recorded["choice"], "disagree");
}

#[tokio::test]
async fn test_vote_change_under_locked_policy() {
    let router = router(VotePolicy::Locked);
    let fact = publish(&router, "Goldfish have short memories").await;
    let id = fact["id"].as_str().unwrap();

    vote(&router, id, "alice", "agree").await;
    let (status, err) = vote(&router, id, "alice", "disagree").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["previousChoice"], "agree");
}

#[tokio::test]
async fn test_vote_validation() {
    let router = router(VotePolicy::AllowChange);
    let fact = publish(&router, "Mount Everest grows every year").await;
    let id = fact["id"].as_str().unwrap();

    let (status, err) = vote(&router, id, "alice", "maybe").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation");

    let (status, _) = vote(&router, id, "   ", "agree").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &router,
        Method::PATCH,
        &format!("/fact/{id}/vote"),
        Some(json!({ "voterId": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_vote_on_unknown_fact() {
    let router = router(VotePolicy::AllowChange);

    let (status, err) = vote(&router, "6f1c2b9e-0000-4000-8000-000000000000", "alice", "agree").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");

    let (status, _) = vote(&router, "not-a-uuid", "alice", "agree").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_voter_choice_before_voting() {
    let router = router(VotePolicy::AllowChange);
    let fact = publish(&router, "Octopuses taste with their arms").await;
    let id = fact["id"].as_str().unwrap();

    let (status, recorded) = send(&router, Method::GET, &format!("/fact/{id}/vote/bob"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(recorded["choice"], Value::Null);
}

#[tokio::test]
async fn test_storage_not_ready() {
    let state = State::new(Config::default());
    state.storage.set(StorageStatus::Connecting { attempt: 2 });
    let router = app(state);

    let (status, err) = send(&router, Method::GET, "/fact/current", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(err["error"], "storage_unavailable");

    let (status, health) = send(&router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "connecting");
}

#[tokio::test]
async fn test_health_when_ready() {
    let router = router(VotePolicy::AllowChange);

    let (status, health) = send(&router, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ready");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_over_http() {
    let router = router(VotePolicy::AllowChange);
    let fact = publish(&router, "Bees can recognize faces").await;
    let id = fact["id"].as_str().unwrap().to_string();

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let router = router.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let choice = if i % 4 == 0 { "disagree" } else { "agree" };
                vote(&router, &id, &format!("voter-{i}"), choice).await.0
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let (_, fetched) = send(&router, Method::GET, &format!("/fact/{id}"), None).await;
    assert_eq!(fetched["agrees"], 48);
    assert_eq!(fetched["disagrees"], 16);
}

#[tokio::test]
async fn test_padded_voter_id_is_rejected_not_merged() {
    let router = router(VotePolicy::AllowChange);
    let fact = publish(&router, "Honey never spoils").await;
    let id = fact["id"].as_str().unwrap();

    let (status, _) = vote(&router, id, "alice", "agree").await;
    assert_eq!(status, StatusCode::OK);

    let (status, err) = vote(&router, id, " alice ", "agree").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation");

    let (_, fetched) = send(&router, Method::GET, &format!("/fact/{id}"), None).await;
    assert_eq!(fetched["agrees"], 1);
}

#[tokio::test]
async fn test_payload_is_validated_before_fact_lookup() {
    let router = router(VotePolicy::AllowChange);
    let unknown = "6f1c2b9e-0000-4000-8000-000000000000";

    let (status, err) = vote(&router, unknown, "alice", "maybe").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation");

    let (status, _) = vote(&router, unknown, "", "agree").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, err) = vote(&router, unknown, "alice", "agree").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");
}
