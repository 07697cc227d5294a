//! Integration tests for item reads, feed sources and health probes.

mod common;

use common::{seed_items, spawn_app};
use serde_json::Value;

#[tokio::test]
async fn items_returns_paginated_envelope() {
    let app = spawn_app().await;
    seed_items(&app, 250).await;

    let response = app
        .client
        .get(app.url("/items"))
        .query(&[("limit", "100"), ("offset", "0")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-cache"], "MISS");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 100);
    assert_eq!(body["total_count"], 250);
    assert_eq!(body["has_more"], true);
    assert_eq!(body["next_cursor"], "offset:100");
}

#[tokio::test]
async fn items_cursor_walk_terminates() {
    let app = spawn_app().await;
    seed_items(&app, 25).await;

    let mut cursor: Option<String> = None;
    let mut collected = Vec::new();

    loop {
        let mut request = app.client.get(app.url("/items")).query(&[("limit", "10")]);
        if let Some(c) = &cursor {
            request = request.query(&[("cursor", c.as_str())]);
        }
        let body: Value = request.send().await.unwrap().json().await.unwrap();

        for item in body["items"].as_array().unwrap() {
            collected.push(item["link"].as_str().unwrap().to_string());
        }

        if body["has_more"] == false {
            break;
        }
        cursor = Some(body["next_cursor"].as_str().unwrap().to_string());
    }

    collected.sort();
    collected.dedup();
    assert_eq!(collected.len(), 25);
}

#[tokio::test]
async fn items_keyword_filter_is_case_insensitive() {
    let app = spawn_app().await;
    seed_items(&app, 250).await;

    let response = app
        .client
        .get(app.url("/items"))
        .query(&[("limit", "100"), ("keyword", "ALPHA")])
        .send()
        .await
        .unwrap();

    let body: Value = response.json().await.unwrap();
    let items = body["items"].as_array().unwrap();

    assert!(!items.is_empty());
    assert!(items.len() <= 100);
    for item in items {
        assert!(item["title"]
            .as_str()
            .unwrap()
            .to_lowercase()
            .contains("alpha"));
    }
    // total_count counts the matching set before the keyword filter.
    assert_eq!(body["total_count"], 250);
}

#[tokio::test]
async fn items_author_filter() {
    let app = spawn_app().await;
    seed_items(&app, 30).await;

    let body: Value = app
        .client
        .get(app.url("/items"))
        .query(&[("author", "alice")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 10);
    for item in items {
        assert_eq!(item["author"], "alice");
    }
}

#[tokio::test]
async fn items_source_prefix_filter() {
    let app = spawn_app().await;
    seed_items(&app, 10).await;

    let body: Value = app
        .client
        .get(app.url("/items"))
        .query(&[("source", "https://seeded.example")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["total_count"], 10);

    let body: Value = app
        .client
        .get(app.url("/items"))
        .query(&[("source", "https://other.example")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["total_count"], 0);
}

#[tokio::test]
async fn items_rejects_bad_parameters() {
    let app = spawn_app().await;

    for (name, value) in [
        ("limit", "abc"),
        ("offset", "-3"),
        ("date_from", "yesterday"),
        ("date_to", "2025-13-99"),
    ] {
        let response = app
            .client
            .get(app.url("/items"))
            .query(&[(name, value)])
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400, "{name}={value} should be rejected");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "BAD_REQUEST");
    }
}

#[tokio::test]
async fn items_repeat_query_is_cache_hit() {
    let app = spawn_app().await;
    seed_items(&app, 5).await;

    let first = app
        .client
        .get(app.url("/items"))
        .send()
        .await
        .unwrap();
    assert_eq!(first.headers()["x-cache"], "MISS");

    let second = app
        .client
        .get(app.url("/items"))
        .send()
        .await
        .unwrap();
    assert_eq!(second.headers()["x-cache"], "HIT");
}

#[tokio::test]
async fn items_legacy_returns_plain_array() {
    let app = spawn_app().await;
    seed_items(&app, 12).await;

    let response = app
        .client
        .get(app.url("/items/legacy"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 12);
}

#[tokio::test]
async fn feeds_lists_predefined_sources() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/feeds")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let sources = body.as_array().unwrap();
    assert!(!sources.is_empty());
    for source in sources {
        assert!(source["name"].is_string());
        assert!(source["url"].is_string());
    }
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["datastore"], "healthy");

    let response = app
        .client
        .get(app.url("/health/live"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "alive");

    let response = app
        .client
        .get(app.url("/health/ready"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn every_response_carries_a_request_id() {
    let app = spawn_app().await;

    for path in ["/items", "/feeds", "/items/legacy"] {
        let response = app.client.get(app.url(path)).send().await.unwrap();
        assert!(
            response.headers().contains_key("x-request-id"),
            "{path} must answer with X-Request-ID"
        );
    }
}
