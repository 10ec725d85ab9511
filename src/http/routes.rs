use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users", post(handlers::create_user))
        .route("/users/:id", get(handlers::get_user))
        .route("/users/:id/block", post(handlers::block_user))
        .route("/users/:id/unblock", post(handlers::unblock_user))
        .route("/users/:id/posts", get(handlers::list_user_posts))
}

pub fn account() -> Router<AppState> {
    Router::new()
        .route("/account/blocks", get(handlers::list_blocked))
        .route("/account/privacy", get(handlers::get_privacy))
        .route("/account/privacy", patch(handlers::update_privacy))
        .route("/account/ban-status", get(handlers::get_own_ban_status))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", post(handlers::create_post))
        .route("/posts/:id", get(handlers::get_post))
        .route("/posts/:id", delete(handlers::delete_post))
        .route("/posts/:id/reactions", post(handlers::react_to_post))
        .route("/posts/:id/reactions", delete(handlers::remove_reaction))
        .route("/posts/:id/comments", post(handlers::comment_on_post))
        .route("/posts/:id/comments", get(handlers::list_post_comments))
}

pub fn reports() -> Router<AppState> {
    Router::new()
        .route("/reports", post(handlers::create_report))
        .route("/reports", get(handlers::list_my_reports))
        .route("/reports/:id/review", post(handlers::review_report))
        .route("/reports/:id/dismiss", post(handlers::dismiss_report))
}

pub fn moderation() -> Router<AppState> {
    Router::new()
        .route(
            "/moderation/users/:id/ban-status",
            get(handlers::get_user_ban_status),
        )
        .route("/moderation/audit", get(handlers::list_moderation_audit))
}
