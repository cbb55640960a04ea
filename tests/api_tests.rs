use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;

use cineflow_api::{
    api::{create_router, AppState},
    config::Config,
};

/// Builds a server against a Redis URL nothing listens on. Every request
/// exercised here is rejected by validation before any cache or upstream
/// call happens.
async fn create_test_server() -> TestServer {
    let config: Config = serde_json::from_value(json!({
        "redis_url": "redis://127.0.0.1:6399",
        "tmdb_api_url": "http://127.0.0.1:6398",
        "tmdb_api_key": "test-key"
    }))
    .unwrap();

    let (state, _writer) = AppState::new(&config).await.unwrap();
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server().await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_responses_carry_request_id_header() {
    let server = create_test_server().await;
    let response = server.get("/health").await;
    assert!(response.headers().get("x-request-id").is_some());
}

#[tokio::test]
async fn test_unknown_mood_discovery_is_a_400() {
    let server = create_test_server().await;
    let response = server.get("/movies/mood/melancholic_jazz").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("melancholic_jazz"));
}

#[tokio::test]
async fn test_refresh_rejects_unknown_mood() {
    let server = create_test_server().await;
    let response = server
        .post("/moods/refresh")
        .json(&json!({ "mood": "nonsense" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pin_mutation_rejects_unknown_mood() {
    let server = create_test_server().await;
    let response = server
        .post("/moods/pins")
        .json(&json!({ "mood": "nonsense", "add": [603] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_keyword_query_requires_mood() {
    let server = create_test_server().await;
    let response = server.get("/moods/keywords").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server.get("/moods/keywords?mood=nonsense").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_seed_requires_a_movie_reference() {
    let server = create_test_server().await;
    let response = server
        .post("/moods/seed")
        .json(&json!({ "mood": "feelgood" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert!(body["detail"].as_str().unwrap().contains("tmdb_id"));
}

#[tokio::test]
async fn test_seed_rejects_unknown_mood_before_lookups() {
    let server = create_test_server().await;
    let response = server
        .post("/moods/seed")
        .json(&json!({ "mood": "nonsense", "tmdb_id": 603 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_config_update_rejects_non_mapping_body() {
    let server = create_test_server().await;
    let response = server
        .post("/moods/config")
        .json(&json!([1, 2, 3]))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_config_update_rejects_malformed_pins() {
    let server = create_test_server().await;

    let response = server
        .post("/moods/config")
        .json(&json!({ "pins": [603, 604] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/moods/config")
        .json(&json!({ "pins": { "feelgood": ["not-a-number"] } }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_config_update_rejects_malformed_keywords() {
    let server = create_test_server().await;
    let response = server
        .post("/moods/config")
        .json(&json!({ "keywords": { "feelgood": [{"id": 1}] } }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_search_short_circuits() {
    let server = create_test_server().await;
    let response = server.get("/movies/search?q=").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["results"], json!([]));
}

#[tokio::test]
async fn test_by_person_requires_name() {
    let server = create_test_server().await;
    let response = server.get("/movies/by_person").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server.get("/movies/by_person?name=%20%20").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}
