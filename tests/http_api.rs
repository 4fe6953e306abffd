use batch_preview::config::AppConfig;
use batch_preview::seed::{load_seed_data, SEED_BATCH_SPEC_ID};
use batch_preview::store::InMemoryStore;
use batch_preview::{
    BatchSpec, BranchChangeset, ChangesetSpec, ChangesetSpecKind, ExternalServiceType, Repo,
};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

// Test client wrapper for making API calls
struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(&format!("{}{}", self.base_url, path))
            .send()
            .await
    }

    async fn post(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(&format!("{}{}", self.base_url, path))
            .json(&json)
            .send()
            .await
    }
}

/// Serves the seeded store on an ephemeral port.
async fn spawn_server() -> TestClient {
    let store = InMemoryStore::new();
    load_seed_data(&store).await.expect("seed data");
    spawn_server_with(store).await
}

async fn spawn_server_with(store: InMemoryStore) -> TestClient {
    let store = Arc::new(store);
    let mut config = AppConfig::default();
    config.preview.default_page_size = 2;
    config.preview.max_page_size = 10;
    let app = batch_preview::app(store, &config);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });

    TestClient::new(format!("http://{}", addr))
}

fn preview_path(query: &str) -> String {
    format!("/batch-specs/{}/apply-preview{}", SEED_BATCH_SPEC_ID, query)
}

#[tokio::test]
async fn test_health() {
    let client = spawn_server().await;
    let response = client.get("/health").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_apply_preview_pages() {
    let client = spawn_server().await;

    let response = client.get(&preview_path("")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first: Value = response.json().await.unwrap();
    assert_eq!(first["total_count"], 5);
    assert_eq!(first["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(first["page_info"]["hasNextPage"], true);
    assert_eq!(first["page_info"]["endCursor"], "2");
    assert_eq!(first["stats"]["modified"], 3);
    assert_eq!(first["stats"]["removed"], 1);

    let response = client.get(&preview_path("?first=10&after=4")).await.unwrap();
    let last: Value = response.json().await.unwrap();
    assert_eq!(last["nodes"].as_array().unwrap().len(), 1);
    assert_eq!(last["page_info"]["hasNextPage"], false);
    assert!(last["page_info"]["endCursor"].is_null());
}

#[tokio::test]
async fn test_hidden_node_exposes_ids_only() {
    let client = spawn_server().await;

    let body: Value = client
        .get(&preview_path("?first=10"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let nodes = body["nodes"].as_array().unwrap();
    let hidden: Vec<_> = nodes.iter().filter(|node| node["hidden"] == true).collect();

    assert_eq!(hidden.len(), 1);
    assert_eq!(hidden[0]["target"], "ATTACH");
    assert!(hidden[0]["repository"].is_null());
    assert!(hidden[0]["title"].is_null());
    assert_eq!(hidden[0]["operations"], json!([]));
    assert_eq!(hidden[0]["delta"]["diffChanged"], false);
}

#[tokio::test]
async fn test_action_filter() {
    let client = spawn_server().await;

    let body: Value = client
        .get(&preview_path("?action=update"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["nodes"][0]["repository"], "github.com/acme/api");
    assert_eq!(body["nodes"][0]["operations"], json!(["PUSH", "UPDATE"]));
}

#[tokio::test]
async fn test_invalid_input_is_bad_request() {
    let client = spawn_server().await;

    for query in ["?after=nope", "?action=explode", "?current_state=sideways", "?search=%22open"] {
        let response = client.get(&preview_path(query)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", query);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("invalid input"));
    }
}

#[tokio::test]
async fn test_error_statuses() {
    let client = spawn_server().await;

    let response = client
        .get("/batch-specs/404/apply-preview")
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.get(&preview_path("?batch_change=77")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_publication_states_override() {
    let client = spawn_server().await;

    // Unknown spec rand ids are rejected.
    let response = client
        .post(
            &preview_path(""),
            json!({ "publication_states": { "does-not-exist": "published" } }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Without overrides the POST behaves like the GET.
    let response = client.post(&preview_path("?first=10"), json!({})).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["stats"]["publish"], 1);
}

#[tokio::test]
async fn test_publication_state_override_changes_plan() {
    let store = InMemoryStore::new();
    store.insert_repo(Repo::new(1, "github.com/acme/docs", ExternalServiceType::GitHub));
    store.insert_batch_spec(BatchSpec::new(30, "acme", "fix-typos"));
    let spec = ChangesetSpec::new(
        31,
        30,
        1,
        ChangesetSpecKind::Branch(BranchChangeset {
            title: "Fix typos".to_string(),
            body: String::new(),
            diff: "+typo\n".to_string(),
            base_ref: "refs/heads/main".to_string(),
            base_rev: "abc".to_string(),
            head_ref: "refs/heads/fix-typos".to_string(),
            commit_message: "Fix typos".to_string(),
            commit_author_name: "Jo".to_string(),
            commit_author_email: "jo@example.com".to_string(),
            published: None,
        }),
    );
    let rand_id = spec.rand_id.clone();
    store.insert_changeset_spec(spec);
    let client = spawn_server_with(store).await;
    let path = "/batch-specs/30/apply-preview";

    let body: Value = client.get(path).await.unwrap().json().await.unwrap();
    assert_eq!(body["nodes"][0]["operations"], json!([]));

    let response = client
        .post(path, json!({ "publication_states": HashMap::from([(rand_id.clone(), "draft")]) }))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["nodes"][0]["target"], "ATTACH");
    assert_eq!(body["nodes"][0]["operations"], json!(["PUSH", "PUBLISH_DRAFT"]));
    assert_eq!(body["stats"]["publishDraft"], 1);

    let body: Value = client
        .post(path, json!({ "publication_states": HashMap::from([(rand_id, "published")]) }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["nodes"][0]["operations"], json!(["PUSH", "PUBLISH"]));
}
