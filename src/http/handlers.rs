use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::blocks::BlockService;
use crate::app::engagement::{EngageError, EngagementService};
use crate::app::moderation::ModerationService;
use crate::app::posts::PostService;
use crate::app::privacy::PrivacyService;
use crate::app::reports::{ReportError, ReportService, TransitionOutcome};
use crate::app::users::UserService;
use crate::app::visibility::VisibilityService;
use crate::domain::content::{Comment, Post};
use crate::domain::moderation::{BanStatus, ModerationRecord};
use crate::domain::report::{Report, ReportStatus, ReportedContentType};
use crate::domain::user::PublicUser;
use crate::domain::visibility::{EngagementPolicy, PrivacySettings, ProfileVisibility};
use crate::http::{AdminToken, AppError, AuthUser};
use crate::AppState;

const MAX_POST_LEN: usize = 5000;
const MAX_COMMENT_LEN: usize = 2000;
const MAX_HANDLE_LEN: usize = 32;
const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn page_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, Uuid)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let mut parts = cursor.splitn(2, '/');
    let timestamp = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;
    let id = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, Uuid)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub handle: String,
    pub display_name: String,
    pub university: String,
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<crate::domain::user::User>, AppError> {
    let handle = payload.handle.trim();
    let display_name = payload.display_name.trim();
    let university = payload.university.trim();

    if handle.is_empty() || display_name.is_empty() || university.is_empty() {
        return Err(AppError::bad_request(
            "handle, display_name and university are required",
        ));
    }
    if handle.len() > MAX_HANDLE_LEN {
        return Err(AppError::bad_request("handle must be at most 32 characters"));
    }

    let service = UserService::new(state.db.clone());
    let user = service
        .create_user(
            handle.to_string(),
            display_name.to_string(),
            university.to_string(),
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, handle = handle, "failed to create user");
            AppError::internal("failed to create user")
        })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::conflict("handle already taken")),
    }
}

pub async fn get_user(
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, AppError> {
    let service = UserService::new(state.db.clone());
    let user = service.get_user(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;

    match user {
        Some(user) => Ok(Json(user.into())),
        None => Err(AppError::not_found("user not found")),
    }
}

// ---------------------------------------------------------------------------
// Block graph
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct BlockResponse {
    pub blocked: bool,
}

pub async fn block_user(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<BlockResponse>, AppError> {
    if auth.user_id == id {
        return Err(AppError::forbidden("cannot block yourself"));
    }

    let users = UserService::new(state.db.clone());
    let target = users.get_user(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to fetch block target");
        AppError::internal("failed to block user")
    })?;
    if target.is_none() {
        return Err(AppError::not_found("user not found"));
    }

    let service = BlockService::new(state.db.clone());
    let blocked = service.block(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, blocker_id = %auth.user_id, blocked_id = %id, "failed to block user");
        AppError::internal("failed to block user")
    })?;

    Ok(Json(BlockResponse { blocked }))
}

#[derive(Serialize)]
pub struct UnblockResponse {
    pub unblocked: bool,
}

pub async fn unblock_user(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<UnblockResponse>, AppError> {
    let service = BlockService::new(state.db.clone());
    let unblocked = service.unblock(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, blocker_id = %auth.user_id, blocked_id = %id, "failed to unblock user");
        AppError::internal("failed to unblock user")
    })?;

    Ok(Json(UnblockResponse { unblocked }))
}

#[derive(Serialize)]
pub struct BlockedUserItem {
    pub user: PublicUser,
    #[serde(with = "time::serde::rfc3339")]
    pub blocked_at: OffsetDateTime,
}

pub async fn list_blocked(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<BlockedUserItem>>, AppError> {
    let limit = page_limit(query.limit);
    let cursor = parse_cursor(query.cursor)?;

    let service = BlockService::new(state.db.clone());
    let edges = service
        .list_blocked(auth.user_id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list blocked users");
            AppError::internal("failed to list blocked users")
        })?;

    let has_more = edges.len() as i64 > limit;
    let mut edges = edges;
    edges.truncate(limit as usize);

    let next_cursor = if has_more {
        encode_cursor(edges.last().map(|edge| (edge.blocked_at, edge.user.id)))
    } else {
        None
    };

    let items = edges
        .into_iter()
        .map(|edge| BlockedUserItem {
            user: edge.user,
            blocked_at: edge.blocked_at,
        })
        .collect();

    Ok(Json(ListResponse { items, next_cursor }))
}

// ---------------------------------------------------------------------------
// Privacy settings
// ---------------------------------------------------------------------------

pub async fn get_privacy(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PrivacySettings>, AppError> {
    let service = PrivacyService::new(state.db.clone());
    let settings = service.get(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch privacy settings");
        AppError::internal("failed to fetch privacy settings")
    })?;

    Ok(Json(settings))
}

#[derive(Deserialize)]
pub struct UpdatePrivacyRequest {
    pub profile_visibility: Option<ProfileVisibility>,
    pub who_can_react: Option<EngagementPolicy>,
    pub who_can_comment: Option<EngagementPolicy>,
}

pub async fn update_privacy(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePrivacyRequest>,
) -> Result<Json<PrivacySettings>, AppError> {
    let service = PrivacyService::new(state.db.clone());
    let settings = service
        .update(
            auth.user_id,
            payload.profile_visibility,
            payload.who_can_react,
            payload.who_can_comment,
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to update privacy settings");
            AppError::internal("failed to update privacy settings")
        })?;

    Ok(Json(settings))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub body: String,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let body = payload.body.trim();
    if body.is_empty() {
        return Err(AppError::bad_request("body is required"));
    }
    if body.len() > MAX_POST_LEN {
        return Err(AppError::bad_request("body must be at most 5000 characters"));
    }

    ensure_not_banned(&state, auth.user_id).await?;

    let service = PostService::new(state.db.clone(), state.classifier.clone());
    let post = service
        .create_post(auth.user_id, body.to_string())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    Ok(Json(post))
}

pub async fn get_post(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Post>, AppError> {
    let service = PostService::new(state.db.clone(), state.classifier.clone());
    let post = service.get_post(id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, viewer_id = %auth.user_id, "failed to fetch post");
        AppError::internal("failed to fetch post")
    })?;

    match post {
        Some(post) => Ok(Json(post)),
        None => Err(AppError::not_found("post not found")),
    }
}

pub async fn delete_post(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = PostService::new(state.db.clone(), state.classifier.clone());
    let deleted = service.delete_post(id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, user_id = %auth.user_id, "failed to delete post");
        AppError::internal("failed to delete post")
    })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("post not found"))
    }
}

#[derive(Serialize)]
pub struct VisiblePostsResponse {
    pub items: Vec<Post>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub total_count: i64,
}

pub async fn list_user_posts(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<VisiblePostsResponse>, AppError> {
    let limit = page_limit(query.limit);
    let cursor = parse_cursor(query.cursor)?;

    let users = UserService::new(state.db.clone());
    let owner = users.get_user(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
        AppError::internal("failed to list posts")
    })?;
    if owner.is_none() {
        return Err(AppError::not_found("user not found"));
    }

    let service = VisibilityService::new(state.db.clone());
    let page = service
        .list_visible_posts(id, auth.user_id, cursor, limit)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, owner_id = %id, viewer_id = %auth.user_id, "failed to list posts");
            AppError::internal("failed to list posts")
        })?;

    let next_cursor = if page.has_more {
        encode_cursor(page.items.last().map(|post| (post.created_at, post.id)))
    } else {
        None
    };

    Ok(Json(VisiblePostsResponse {
        items: page.items,
        next_cursor,
        has_more: page.has_more,
        total_count: page.total_count,
    }))
}

// ---------------------------------------------------------------------------
// Engagement
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ReactResponse {
    pub reacted: bool,
}

pub async fn react_to_post(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ReactResponse>, AppError> {
    let service = EngagementService::new(state.db.clone(), state.classifier.clone());
    let reaction = service
        .react(auth.user_id, id)
        .await
        .map_err(|err| map_engage_error(err, auth.user_id, id, "failed to react"))?;

    Ok(Json(ReactResponse {
        reacted: reaction.is_some(),
    }))
}

#[derive(Serialize)]
pub struct RemoveReactionResponse {
    pub removed: bool,
}

pub async fn remove_reaction(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<RemoveReactionResponse>, AppError> {
    let service = EngagementService::new(state.db.clone(), state.classifier.clone());
    let removed = service.unreact(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to remove reaction");
        AppError::internal("failed to remove reaction")
    })?;

    Ok(Json(RemoveReactionResponse { removed }))
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub body: String,
}

pub async fn comment_on_post(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<Json<Comment>, AppError> {
    let body = payload.body.trim();
    if body.is_empty() {
        return Err(AppError::bad_request("body is required"));
    }
    if body.len() > MAX_COMMENT_LEN {
        return Err(AppError::bad_request("body must be at most 2000 characters"));
    }

    ensure_not_banned(&state, auth.user_id).await?;

    let service = EngagementService::new(state.db.clone(), state.classifier.clone());
    let comment = service
        .comment(auth.user_id, id, body.to_string())
        .await
        .map_err(|err| map_engage_error(err, auth.user_id, id, "failed to comment"))?;

    Ok(Json(comment))
}

#[derive(Serialize)]
pub struct CommentListResponse {
    pub items: Vec<Comment>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

pub async fn list_post_comments(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<CommentListResponse>, AppError> {
    let limit = page_limit(query.limit);
    let cursor = parse_cursor(query.cursor)?;

    let service = EngagementService::new(state.db.clone(), state.classifier.clone());
    let (items, has_more) = service
        .list_comments(auth.user_id, id, cursor, limit)
        .await
        .map_err(|err| map_engage_error(err, auth.user_id, id, "failed to list comments"))?;

    let next_cursor = if has_more {
        encode_cursor(items.last().map(|comment| (comment.created_at, comment.id)))
    } else {
        None
    };

    Ok(Json(CommentListResponse {
        items,
        next_cursor,
        has_more,
    }))
}

fn map_engage_error(err: EngageError, user_id: Uuid, post_id: Uuid, context: &str) -> AppError {
    match err {
        EngageError::PostNotFound => AppError::not_found("post not found"),
        EngageError::NotAllowed => AppError::forbidden("not allowed by the owner's settings"),
        EngageError::Store(err) => {
            tracing::error!(error = ?err, user_id = %user_id, post_id = %post_id, "{}", context);
            AppError::internal(context.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateReportRequest {
    pub content_type: String,
    pub content_id: String,
    pub reason: String,
}

#[derive(Serialize)]
pub struct CreateReportResponse {
    pub report_id: Uuid,
}

pub async fn create_report(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateReportRequest>,
) -> Result<Json<CreateReportResponse>, AppError> {
    let content_type = ReportedContentType::from_db(&payload.content_type).ok_or_else(|| {
        AppError::bad_request("content_type must be one of post, comment, user")
    })?;
    let content_id = Uuid::parse_str(payload.content_id.trim())
        .map_err(|_| AppError::bad_request("content_id must be a valid id"))?;

    let service = ReportService::new(state.db.clone());
    let report = service
        .create_report(auth.user_id, content_type, content_id, &payload.reason)
        .await
        .map_err(|err| match err {
            ReportError::Validation(message) => AppError::bad_request(message),
            ReportError::TargetNotFound => AppError::not_found("content not found"),
            ReportError::SelfReport => AppError::forbidden("cannot report your own content"),
            ReportError::Duplicate => AppError::conflict("already reported"),
            ReportError::Store(err) => {
                tracing::error!(
                    error = ?err,
                    reporter_id = %auth.user_id,
                    content_type = content_type.as_db(),
                    content_id = %content_id,
                    "failed to create report"
                );
                AppError::internal("failed to create report")
            }
        })?;

    Ok(Json(CreateReportResponse {
        report_id: report.id,
    }))
}

pub async fn list_my_reports(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Report>>, AppError> {
    let limit = page_limit(query.limit);
    let cursor = parse_cursor(query.cursor)?;

    let service = ReportService::new(state.db.clone());
    let reports = service
        .list_for_reporter(auth.user_id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, reporter_id = %auth.user_id, "failed to list reports");
            AppError::internal("failed to list reports")
        })?;

    let has_more = reports.len() as i64 > limit;
    let mut items = reports;
    items.truncate(limit as usize);

    let next_cursor = if has_more {
        encode_cursor(items.last().map(|report| (report.created_at, report.id)))
    } else {
        None
    };

    Ok(Json(ListResponse { items, next_cursor }))
}

pub async fn review_report(
    _admin: AdminToken,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Report>, AppError> {
    transition_report(state, id, ReportStatus::Reviewed).await
}

pub async fn dismiss_report(
    _admin: AdminToken,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Report>, AppError> {
    transition_report(state, id, ReportStatus::Dismissed).await
}

async fn transition_report(
    state: AppState,
    report_id: Uuid,
    to: ReportStatus,
) -> Result<Json<Report>, AppError> {
    let service = ReportService::new(state.db.clone());
    let outcome = service.transition(report_id, to).await.map_err(|err| {
        tracing::error!(error = ?err, report_id = %report_id, "failed to transition report");
        AppError::internal("failed to transition report")
    })?;

    match outcome {
        Some(TransitionOutcome::Updated(report)) => Ok(Json(report)),
        Some(TransitionOutcome::AlreadyResolved) => {
            Err(AppError::conflict("report already resolved"))
        }
        None => Err(AppError::not_found("report not found")),
    }
}

// ---------------------------------------------------------------------------
// Moderation
// ---------------------------------------------------------------------------

pub async fn get_own_ban_status(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<BanStatus>, AppError> {
    ban_status(&state, auth.user_id).await.map(Json)
}

pub async fn get_user_ban_status(
    _admin: AdminToken,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<BanStatus>, AppError> {
    let users = UserService::new(state.db.clone());
    let user = users.get_user(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
        AppError::internal("failed to fetch ban status")
    })?;
    if user.is_none() {
        return Err(AppError::not_found("user not found"));
    }

    ban_status(&state, id).await.map(Json)
}

async fn ban_status(state: &AppState, user_id: Uuid) -> Result<BanStatus, AppError> {
    let service = ModerationService::new(state.db.clone(), state.classifier.clone());
    service.check_user_ban_status(user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %user_id, "failed to check ban status");
        AppError::internal("failed to check ban status")
    })
}

async fn ensure_not_banned(state: &AppState, user_id: Uuid) -> Result<(), AppError> {
    let status = ban_status(state, user_id).await?;
    if status.is_banned {
        return Err(AppError::forbidden("account is suspended"));
    }
    Ok(())
}

pub async fn list_moderation_audit(
    _admin: AdminToken,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<ModerationRecord>>, AppError> {
    let limit = page_limit(query.limit);
    let cursor = parse_cursor(query.cursor)?;

    let service = ModerationService::new(state.db.clone(), state.classifier.clone());
    let records = service.list_audit(cursor, limit + 1).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list moderation audit");
        AppError::internal("failed to list moderation audit")
    })?;

    let has_more = records.len() as i64 > limit;
    let mut items = records;
    items.truncate(limit as usize);

    let next_cursor = if has_more {
        encode_cursor(items.last().map(|record| (record.created_at, record.id)))
    } else {
        None
    };

    Ok(Json(ListResponse { items, next_cursor }))
}
