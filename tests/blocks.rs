//! Block Graph Tests
//!
//! Covers idempotent block/unblock, self-block policy, and the block list.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

#[test]
fn block_user() {
    common::block_on(async move {
    let app = app().await;
    let user_a = app.create_user("blk_a", "stanford.edu").await;
    let user_b = app.create_user("blk_b", "stanford.edu").await;

    let resp = app
        .post_json(
            &format!("/users/{}/block", user_b.id),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["blocked"].as_bool().unwrap(), true);
    });
}

#[test]
fn block_twice_is_idempotent() {
    common::block_on(async move {
    let app = app().await;
    let user_a = app.create_user("blk_dup_a", "stanford.edu").await;
    let user_b = app.create_user("blk_dup_b", "stanford.edu").await;

    let resp = app
        .post_json(
            &format!("/users/{}/block", user_b.id),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["blocked"].as_bool().unwrap(), true);

    // Second call succeeds without inserting a duplicate edge.
    let resp = app
        .post_json(
            &format!("/users/{}/block", user_b.id),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["blocked"].as_bool().unwrap(), false);

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM blocks WHERE blocker_id = $1 AND blocked_id = $2",
    )
    .bind(user_a.id)
    .bind(user_b.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(count, 1);
    });
}

#[test]
fn block_self_is_policy_violation() {
    common::block_on(async move {
    let app = app().await;
    let user = app.create_user("blk_self", "stanford.edu").await;

    let resp = app
        .post_json(
            &format!("/users/{}/block", user.id),
            json!({}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "cannot block yourself");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blocks WHERE blocker_id = $1")
        .bind(user.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
    });
}

#[test]
fn block_nonexistent_user() {
    common::block_on(async move {
    let app = app().await;
    let user = app.create_user("blk_ghost", "stanford.edu").await;

    let resp = app
        .post_json(
            &format!("/users/{}/block", Uuid::new_v4()),
            json!({}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    });
}

#[test]
fn unblock_is_idempotent() {
    common::block_on(async move {
    let app = app().await;
    let user_a = app.create_user("unblk_a", "stanford.edu").await;
    let user_b = app.create_user("unblk_b", "stanford.edu").await;

    app.post_json(
        &format!("/users/{}/block", user_b.id),
        json!({}),
        Some(&user_a.access_token),
    )
    .await;

    let resp = app
        .post_json(
            &format!("/users/{}/unblock", user_b.id),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["unblocked"].as_bool().unwrap(), true);

    // Absence of the edge is not an error.
    let resp = app
        .post_json(
            &format!("/users/{}/unblock", user_b.id),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["unblocked"].as_bool().unwrap(), false);
    });
}

#[test]
fn list_blocked_newest_first() {
    common::block_on(async move {
    let app = app().await;
    let user = app.create_user("blklist", "stanford.edu").await;
    let first = app.create_user("blklist_1", "stanford.edu").await;
    let second = app.create_user("blklist_2", "berkeley.edu").await;

    app.post_json(
        &format!("/users/{}/block", first.id),
        json!({}),
        Some(&user.access_token),
    )
    .await;
    app.post_json(
        &format!("/users/{}/block", second.id),
        json!({}),
        Some(&user.access_token),
    )
    .await;

    let resp = app.get("/account/blocks", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    // Reverse chronological: the most recently blocked user comes first.
    assert_eq!(
        items[0]["user"]["id"].as_str().unwrap(),
        second.id.to_string()
    );
    assert_eq!(
        items[1]["user"]["id"].as_str().unwrap(),
        first.id.to_string()
    );
    // Display attributes resolved at read time.
    assert_eq!(
        items[0]["user"]["handle"].as_str().unwrap(),
        second.handle
    );
    });
}

#[test]
fn block_requires_auth() {
    common::block_on(async move {
    let app = app().await;
    let user = app.create_user("blk_noauth", "stanford.edu").await;

    let resp = app
        .post_json(&format!("/users/{}/block", user.id), json!({}), None)
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    });
}
