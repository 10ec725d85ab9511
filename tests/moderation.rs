//! Moderation & Ban Tests
//!
//! Synchronous moderation at creation, the safe default under classifier
//! failure, ban escalation, and the derived ban-status projection.

mod common;

use axum::http::StatusCode;
use common::{app, OUTAGE_MARKER, PERM_BAN_MARKER, REMOVE_MARKER, TEMP_BAN_MARKER};
use serde_json::json;
use sqlx::Row;

#[test]
fn clean_post_is_approved_and_unflagged() {
    common::block_on(async move {
    let app = app().await;
    let user = app.create_user("mod_clean", "stanford.edu").await;

    let resp = app
        .post_json(
            "/posts",
            json!({"body": "a perfectly ordinary post"}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["flagged"].as_bool().unwrap(), false);

    let row = sqlx::query("SELECT action FROM moderation_records WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("action"), "approved");
    });
}

#[test]
fn removed_content_is_flagged_and_hidden() {
    common::block_on(async move {
    let app = app().await;
    let owner = app.create_user("mod_rem_o", "stanford.edu").await;
    let viewer = app.create_user("mod_rem_v", "stanford.edu").await;

    let resp = app
        .post_json(
            "/posts",
            json!({"body": format!("terrible content {}", REMOVE_MARKER)}),
            Some(&owner.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["flagged"].as_bool().unwrap(), true);
    let post_id = body["id"].as_str().unwrap().to_string();

    // Hidden from everyone but the owner.
    let resp = app
        .get(&format!("/posts/{}", post_id), Some(&viewer.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .get(&format!("/posts/{}", post_id), Some(&owner.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    });
}

#[test]
fn classifier_outage_falls_back_to_manual_review() {
    common::block_on(async move {
    let app = app().await;
    let user = app.create_user("mod_down", "stanford.edu").await;

    let resp = app
        .post_json(
            "/posts",
            json!({"body": format!("hello {}", OUTAGE_MARKER)}),
            Some(&user.access_token),
        )
        .await;

    // Submission never fails on classifier outage.
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    // Safe default: not flagged, queued for manual review.
    assert_eq!(body["flagged"].as_bool().unwrap(), false);

    let row = sqlx::query(
        "SELECT action, violations FROM moderation_records WHERE user_id = $1",
    )
    .bind(user.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(row.get::<String, _>("action"), "manual_review");
    assert!(row.get::<Vec<String>, _>("violations").is_empty());
    });
}

#[test]
fn escalation_creates_temporary_shadow_ban() {
    common::block_on(async move {
    let app = app().await;
    let user = app.create_user("mod_tban", "stanford.edu").await;

    let resp = app
        .post_json(
            "/posts",
            json!({"body": format!("abusive {}", TEMP_BAN_MARKER)}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let row = sqlx::query(
        "SELECT ban_type, expires_at IS NOT NULL AS has_expiry, is_active \
         FROM bans WHERE user_id = $1",
    )
    .bind(user.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(row.get::<String, _>("ban_type"), "shadow_ban");
    assert!(row.get::<bool, _>("has_expiry"));
    assert!(row.get::<bool, _>("is_active"));

    let resp = app.get("/account/ban-status", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["is_banned"].as_bool().unwrap(), true);
    assert_eq!(body["ban_type"].as_str().unwrap(), "shadow_ban");
    assert!(body["expires_at"].is_string());
    });
}

#[test]
fn escalation_without_duration_is_permanent() {
    common::block_on(async move {
    let app = app().await;
    let user = app.create_user("mod_pban", "stanford.edu").await;

    let resp = app
        .post_json(
            "/posts",
            json!({"body": format!("{}", PERM_BAN_MARKER)}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app.get("/account/ban-status", Some(&user.access_token)).await;
    let body = resp.json();
    assert_eq!(body["is_banned"].as_bool().unwrap(), true);
    assert_eq!(body["ban_type"].as_str().unwrap(), "permanent_ban");
    assert!(body["expires_at"].is_null());
    });
}

#[test]
fn banned_user_cannot_submit() {
    common::block_on(async move {
    let app = app().await;
    let user = app.create_user("mod_gate", "stanford.edu").await;
    app.create_ban(user.id, "permanent_ban", None, true).await;

    let resp = app
        .post_json(
            "/posts",
            json!({"body": "posting while banned"}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE owner_id = $1")
        .bind(user.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
    });
}

#[test]
fn expired_ban_does_not_count_despite_active_flag() {
    common::block_on(async move {
    let app = app().await;
    let user = app.create_user("mod_stale", "stanford.edu").await;
    // is_active = true but expired yesterday: not currently banned.
    app.create_ban(user.id, "shadow_ban", Some(-1), true).await;

    let resp = app.get("/account/ban-status", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["is_banned"].as_bool().unwrap(), false);

    // And submissions go through.
    let resp = app
        .post_json(
            "/posts",
            json!({"body": "back after the ban lapsed"}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    });
}

#[test]
fn permanent_ban_row_reports_null_expiry() {
    common::block_on(async move {
    let app = app().await;
    let user = app.create_user("mod_perm_row", "stanford.edu").await;
    app.create_ban(user.id, "permanent_ban", None, true).await;

    let resp = app
        .get_admin(&format!("/moderation/users/{}/ban-status", user.id))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["is_banned"].as_bool().unwrap(), true);
    assert!(body["expires_at"].is_null());
    });
}

#[test]
fn inactive_ban_does_not_count() {
    common::block_on(async move {
    let app = app().await;
    let user = app.create_user("mod_inact", "stanford.edu").await;
    app.create_ban(user.id, "permanent_ban", None, false).await;

    let resp = app.get("/account/ban-status", Some(&user.access_token)).await;
    assert_eq!(resp.json()["is_banned"].as_bool().unwrap(), false);
    });
}

#[test]
fn audit_trail_records_every_decision() {
    common::block_on(async move {
    let app = app().await;
    let user = app.create_user("mod_audit", "stanford.edu").await;

    app.post_json(
        "/posts",
        json!({"body": "first clean post"}),
        Some(&user.access_token),
    )
    .await;
    app.post_json(
        "/posts",
        json!({"body": format!("bad {}", REMOVE_MARKER)}),
        Some(&user.access_token),
    )
    .await;

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM moderation_records WHERE user_id = $1")
            .bind(user.id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert_eq!(count, 2);

    let resp = app.get_admin("/moderation/audit").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json()["items"].as_array().unwrap().len() >= 2);
    });
}

#[test]
fn moderation_audit_requires_admin_token() {
    common::block_on(async move {
    let app = app().await;

    let resp = app.get("/moderation/audit", None).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    });
}
