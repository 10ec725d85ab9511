//! Visibility Tests
//!
//! The per-viewer read rules: ownership, flagged state, block edges, and
//! profile visibility, plus the post-filter pagination counters.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

#[test]
fn owner_sees_own_flagged_post() {
    common::block_on(async move {
    let app = app().await;
    let owner = app.create_user("vis_own", "stanford.edu").await;
    let post_id = app.create_post_for_user(owner.id, true).await;

    let resp = app
        .get(&format!("/posts/{}", post_id), Some(&owner.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["flagged"].as_bool().unwrap(), true);
    });
}

#[test]
fn flagged_post_hidden_from_other_viewers() {
    common::block_on(async move {
    let app = app().await;
    let owner = app.create_user("vis_flag_o", "stanford.edu").await;
    let viewer = app.create_user("vis_flag_v", "stanford.edu").await;
    let post_id = app.create_post_for_user(owner.id, true).await;

    let resp = app
        .get(&format!("/posts/{}", post_id), Some(&viewer.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    });
}

#[test]
fn blocked_viewer_cannot_see_public_unflagged_post() {
    common::block_on(async move {
    let app = app().await;
    let owner = app.create_user("vis_blk_o", "stanford.edu").await;
    let viewer = app.create_user("vis_blk_v", "stanford.edu").await;
    app.set_privacy(owner.id, "everyone", "everyone", "everyone")
        .await;
    let post_id = app.create_post_for_user(owner.id, false).await;

    // Block in the owner -> viewer direction.
    app.post_json(
        &format!("/users/{}/block", viewer.id),
        json!({}),
        Some(&owner.access_token),
    )
    .await;

    let resp = app
        .get(&format!("/posts/{}", post_id), Some(&viewer.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    });
}

#[test]
fn block_hides_in_both_directions() {
    common::block_on(async move {
    let app = app().await;
    let owner = app.create_user("vis_blk2_o", "stanford.edu").await;
    let viewer = app.create_user("vis_blk2_v", "stanford.edu").await;
    app.set_privacy(owner.id, "everyone", "everyone", "everyone")
        .await;
    let post_id = app.create_post_for_user(owner.id, false).await;

    // The viewer blocks the owner; the owner's content disappears for them too.
    app.post_json(
        &format!("/users/{}/block", owner.id),
        json!({}),
        Some(&viewer.access_token),
    )
    .await;

    let resp = app
        .get(&format!("/posts/{}", post_id), Some(&viewer.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    });
}

#[test]
fn nobody_profile_hides_content_from_everyone_else() {
    common::block_on(async move {
    let app = app().await;
    let owner = app.create_user("vis_nob_o", "stanford.edu").await;
    let viewer = app.create_user("vis_nob_v", "stanford.edu").await;
    app.set_privacy(owner.id, "nobody", "everyone", "everyone")
        .await;
    let post_id = app.create_post_for_user(owner.id, false).await;

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
fn university_profile_requires_same_affiliation() {
    common::block_on(async move {
    let app = app().await;
    let owner = app.create_user("vis_uni_o", "stanford.edu").await;
    let peer = app.create_user("vis_uni_p", "stanford.edu").await;
    let outsider = app.create_user("vis_uni_x", "berkeley.edu").await;
    // Default profile_visibility is university; no settings row needed.
    let post_id = app.create_post_for_user(owner.id, false).await;

    let resp = app
        .get(&format!("/posts/{}", post_id), Some(&peer.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .get(&format!("/posts/{}", post_id), Some(&outsider.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    });
}

#[test]
fn everyone_profile_visible_across_universities() {
    common::block_on(async move {
    let app = app().await;
    let owner = app.create_user("vis_ev_o", "stanford.edu").await;
    let outsider = app.create_user("vis_ev_x", "berkeley.edu").await;
    app.set_privacy(owner.id, "everyone", "everyone", "everyone")
        .await;
    let post_id = app.create_post_for_user(owner.id, false).await;

    let resp = app
        .get(&format!("/posts/{}", post_id), Some(&outsider.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    });
}

#[test]
fn listing_counts_only_visible_posts() {
    common::block_on(async move {
    let app = app().await;
    let owner = app.create_user("vis_list_o", "stanford.edu").await;
    let viewer = app.create_user("vis_list_v", "stanford.edu").await;

    app.create_post_for_user(owner.id, false).await;
    app.create_post_for_user(owner.id, true).await;
    app.create_post_for_user(owner.id, false).await;

    let resp = app
        .get(
            &format!("/users/{}/posts", owner.id),
            Some(&viewer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    // The flagged post is filtered before counting.
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["total_count"].as_i64().unwrap(), 2);
    assert_eq!(body["has_more"].as_bool().unwrap(), false);

    // The owner sees all three.
    let resp = app
        .get(
            &format!("/users/{}/posts", owner.id),
            Some(&owner.access_token),
        )
        .await;
    let body = resp.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 3);
    assert_eq!(body["total_count"].as_i64().unwrap(), 3);
    });
}

#[test]
fn listing_fills_page_past_flagged_rows() {
    common::block_on(async move {
    let app = app().await;
    let owner = app.create_user("vis_page_o", "stanford.edu").await;
    let viewer = app.create_user("vis_page_v", "stanford.edu").await;

    // Newest two posts are flagged; a limit-2 page must skip them and still
    // return the two older visible posts.
    app.create_post_for_user(owner.id, false).await;
    app.create_post_for_user(owner.id, false).await;
    app.create_post_for_user(owner.id, true).await;
    app.create_post_for_user(owner.id, true).await;

    let resp = app
        .get(
            &format!("/users/{}/posts?limit=2", owner.id),
            Some(&viewer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["total_count"].as_i64().unwrap(), 2);
    assert_eq!(body["has_more"].as_bool().unwrap(), false);
    });
}

#[test]
fn blocked_pair_listing_is_empty_with_zero_total() {
    common::block_on(async move {
    let app = app().await;
    let owner = app.create_user("vis_zero_o", "stanford.edu").await;
    let viewer = app.create_user("vis_zero_v", "stanford.edu").await;
    app.create_post_for_user(owner.id, false).await;

    app.post_json(
        &format!("/users/{}/block", viewer.id),
        json!({}),
        Some(&owner.access_token),
    )
    .await;

    let resp = app
        .get(
            &format!("/users/{}/posts", owner.id),
            Some(&viewer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
    assert_eq!(body["total_count"].as_i64().unwrap(), 0);
    assert_eq!(body["has_more"].as_bool().unwrap(), false);
    });
}
