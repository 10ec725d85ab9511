use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::report::{Report, ReportStatus, ReportedContentType};
use crate::infra::db::Db;

const MAX_REASON_LEN: usize = 500;

/// Report intake failures the HTTP layer must tell apart. Store failures
/// keep their cause for logging; everything else maps to a specific status.
#[derive(Debug)]
pub enum ReportError {
    /// Malformed input (empty or oversized reason).
    Validation(&'static str),
    /// The reported content or user does not exist.
    TargetNotFound,
    /// Reporting your own content or account.
    SelfReport,
    /// This reporter already reported this target.
    Duplicate,
    Store(anyhow::Error),
}

impl From<sqlx::Error> for ReportError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return Self::Duplicate;
            }
        }
        Self::Store(err.into())
    }
}

#[derive(Clone)]
pub struct ReportService {
    db: Db,
}

impl ReportService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Validate and record one abuse report. Checks run in a fixed order:
    /// reason shape, target existence, self-report, then the unique insert.
    /// The (reporter, content_type, content_id) constraint is the duplicate
    /// detector; its violation surfaces as [`ReportError::Duplicate`], not a
    /// generic failure.
    pub async fn create_report(
        &self,
        reporter_id: Uuid,
        content_type: ReportedContentType,
        content_id: Uuid,
        reason: &str,
    ) -> Result<Report, ReportError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ReportError::Validation("reason is required"));
        }
        if reason.len() > MAX_REASON_LEN {
            return Err(ReportError::Validation(
                "reason must be at most 500 characters",
            ));
        }

        let owner_id = self
            .resolve_owner(content_type, content_id)
            .await
            .map_err(ReportError::Store)?
            .ok_or(ReportError::TargetNotFound)?;

        if owner_id == reporter_id {
            return Err(ReportError::SelfReport);
        }

        let row = sqlx::query(
            "INSERT INTO reports (reporter_id, content_type, content_id, reason) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, reporter_id, content_type, content_id, reason, status, created_at",
        )
        .bind(reporter_id)
        .bind(content_type.as_db())
        .bind(content_id)
        .bind(reason)
        .fetch_one(self.db.pool())
        .await?;

        parse_report_row(&row).map_err(ReportError::Store)
    }

    pub async fn list_for_reporter(
        &self,
        reporter_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Report>> {
        let rows = match cursor {
            Some((created_at, report_id)) => {
                sqlx::query(
                    "SELECT id, reporter_id, content_type, content_id, reason, status, created_at \
                     FROM reports \
                     WHERE reporter_id = $1 \
                       AND (created_at < $2 OR (created_at = $2 AND id < $3)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $4",
                )
                .bind(reporter_id)
                .bind(created_at)
                .bind(report_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, reporter_id, content_type, content_id, reason, status, created_at \
                     FROM reports \
                     WHERE reporter_id = $1 \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $2",
                )
                .bind(reporter_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        rows.iter().map(parse_report_row).collect()
    }

    /// One-way transition out of `pending`, driven by the external review
    /// process. Returns the updated report, `Ok(None)` when the report does
    /// not exist, and `Err` with a terminal-state marker when it was already
    /// resolved.
    pub async fn transition(
        &self,
        report_id: Uuid,
        to: ReportStatus,
    ) -> Result<Option<TransitionOutcome>> {
        let row = sqlx::query(
            "UPDATE reports SET status = $2 \
             WHERE id = $1 AND status = 'pending' \
             RETURNING id, reporter_id, content_type, content_id, reason, status, created_at",
        )
        .bind(report_id)
        .bind(to.as_db())
        .fetch_optional(self.db.pool())
        .await?;

        if let Some(row) = row {
            return Ok(Some(TransitionOutcome::Updated(parse_report_row(&row)?)));
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM reports WHERE id = $1)")
            .bind(report_id)
            .fetch_one(self.db.pool())
            .await?;

        if exists {
            Ok(Some(TransitionOutcome::AlreadyResolved))
        } else {
            Ok(None)
        }
    }

    async fn resolve_owner(
        &self,
        content_type: ReportedContentType,
        content_id: Uuid,
    ) -> Result<Option<Uuid>> {
        let owner: Option<Uuid> = match content_type {
            ReportedContentType::Post => {
                sqlx::query_scalar("SELECT owner_id FROM posts WHERE id = $1")
                    .bind(content_id)
                    .fetch_optional(self.db.pool())
                    .await?
            }
            ReportedContentType::Comment => {
                sqlx::query_scalar("SELECT owner_id FROM comments WHERE id = $1")
                    .bind(content_id)
                    .fetch_optional(self.db.pool())
                    .await?
            }
            ReportedContentType::User => {
                sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
                    .bind(content_id)
                    .fetch_optional(self.db.pool())
                    .await?
            }
        };

        Ok(owner)
    }
}

#[derive(Debug)]
pub enum TransitionOutcome {
    Updated(Report),
    AlreadyResolved,
}

fn parse_report_row(row: &sqlx::postgres::PgRow) -> Result<Report> {
    let content_type: String = row.get("content_type");
    let status: String = row.get("status");

    Ok(Report {
        id: row.get("id"),
        reporter_id: row.get("reporter_id"),
        content_type: ReportedContentType::from_db(&content_type)
            .ok_or_else(|| anyhow::anyhow!("unknown report content type: {}", content_type))?,
        content_id: row.get("content_id"),
        reason: row.get("reason"),
        status: ReportStatus::from_db(&status)
            .ok_or_else(|| anyhow::anyhow!("unknown report status: {}", status))?,
        created_at: row.get("created_at"),
    })
}
