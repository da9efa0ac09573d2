#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for include resolution and the linked section

mod common;

use common::{details, doc, engine, ids, params};
use http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_include_nested_paths() {
    let (engine, _) = engine();

    let response = engine
        .list(
            "tags",
            &params(json!({
                "ids": "6,7,8,9",
                "include": "posts,posts.tags,posts.author.posts"
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let body = doc(&response);
    assert_eq!(ids(&body["tags"]), ["6", "7", "8", "9"]);
    assert_eq!(ids(&body["linked"]["posts"]), ["12", "13"]);
    assert_eq!(ids(&body["linked"]["people"]), ["4"]);
    assert!(body["linked"].get("tags").is_none());
}

#[tokio::test]
async fn test_include_skips_primary_records() {
    let (engine, _) = engine();

    let response = engine
        .fetch("people", &params(json!({"id": 1, "include": "posts.author"})))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let body = doc(&response);
    assert_eq!(ids(&body["linked"]["posts"]), ["1", "2", "11"]);
    assert!(body["linked"].get("people").is_none());
}

#[tokio::test]
async fn test_include_with_missing_primary_ids() {
    let (engine, _) = engine();

    let response = engine
        .list(
            "tags",
            &params(json!({"ids": "6,99,9,100", "include": "posts"})),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        details(&response)[0],
        "The record identified by 99 could not be found."
    );
}

#[tokio::test]
async fn test_include_with_formatted_keys() {
    let (engine, _) = engine();

    let response = engine
        .list(
            "expense_entries",
            &params(json!({"include": "isoCurrency,employee"})),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let body = doc(&response);
    assert_eq!(ids(&body["expenseEntries"]), ["1", "2"]);
    assert_eq!(ids(&body["linked"]["isoCurrencies"]), ["USD"]);
    assert_eq!(ids(&body["linked"]["people"]), ["3"]);
    assert_eq!(body["expenseEntries"][0]["links"]["isoCurrency"], "USD");
}

#[tokio::test]
async fn test_include_empty_relationship_emits_empty_linked() {
    let (engine, _) = engine();

    let response = engine
        .fetch("posts", &params(json!({"id": 3, "include": "section"})))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(doc(&response)["linked"], json!({}));
}

#[tokio::test]
async fn test_invalid_includes_are_all_reported() {
    let (engine, _) = engine();

    let response = engine
        .list("people", &params(json!({"include": "foo,post"})))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        details(&response),
        [
            "foo is not a valid association of people",
            "post is not a valid association of people",
        ]
    );
}

#[tokio::test]
async fn test_invalid_nested_include() {
    let (engine, _) = engine();

    let response = engine
        .list("posts", &params(json!({"include": "author.foo"})))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        details(&response),
        ["foo is not a valid association of people"]
    );
}

#[tokio::test]
async fn test_fields_with_formatted_attribute_name() {
    let (engine, _) = engine();

    let response = engine
        .list(
            "expense_entries",
            &params(json!({"fields": {"expenseEntries": "transactionDate"}})),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        doc(&response)["expenseEntries"][0],
        json!({"transactionDate": "2014-04-15"})
    );
}

#[tokio::test]
async fn test_include_polymorphic_relationship() {
    let (engine, _) = engine();

    let response = engine
        .list("pictures", &params(json!({"include": "imageable"})))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let body = doc(&response);
    assert_eq!(
        body["pictures"][0]["links"]["imageable"],
        json!({"type": "products", "id": "1"})
    );
    assert_eq!(ids(&body["linked"]["products"]), ["1"]);
    assert_eq!(ids(&body["linked"]["documents"]), ["1"]);
    assert_eq!(body["linked"]["documents"][0]["name"], "Company Brochure");
}

#[tokio::test]
async fn test_include_cannot_traverse_polymorphic_relationship() {
    let (engine, _) = engine();

    let response = engine
        .list("pictures", &params(json!({"include": "imageable.name"})))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        details(&response),
        ["name is not a valid association of imageables"]
    );
}
