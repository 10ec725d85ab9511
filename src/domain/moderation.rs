use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Approved,
    Removed,
    ManualReview,
}

impl ModerationAction {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "approved" => Some(Self::Approved),
            "removed" => Some(Self::Removed),
            "manual_review" => Some(Self::ManualReview),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Removed => "removed",
            Self::ManualReview => "manual_review",
        }
    }
}

/// Outcome of classifying one piece of content. Always definite: the engine
/// substitutes [`ModerationResult::safe_default`] when the classifier cannot
/// answer, so content is never left half-moderated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationResult {
    pub approved: bool,
    pub flagged: bool,
    pub action: ModerationAction,
    pub violations: Vec<String>,
    pub should_ban_user: Option<bool>,
    /// Ban length in days; `None` inside an active ban signal means permanent.
    pub ban_duration_days: Option<i64>,
}

impl ModerationResult {
    /// The deterministic result used when the classifier is unreachable:
    /// not approved, not flagged, queued for manual review. Avoids both
    /// auto-removal and auto-approval while the classifier is down.
    pub fn safe_default() -> Self {
        Self {
            approved: false,
            flagged: false,
            action: ModerationAction::ManualReview,
            violations: Vec::new(),
            should_ban_user: None,
            ban_duration_days: None,
        }
    }

    pub fn requests_ban(&self) -> bool {
        self.should_ban_user == Some(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BanType {
    ShadowBan,
    PermanentBan,
}

impl BanType {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "shadow_ban" => Some(Self::ShadowBan),
            "permanent_ban" => Some(Self::PermanentBan),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::ShadowBan => "shadow_ban",
            Self::PermanentBan => "permanent_ban",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Ban {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ban_type: BanType,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Ban {
    /// `is_active` alone is not enough: a stale active row whose expiry has
    /// passed no longer counts. Expiry is evaluated at read time, never swept.
    pub fn is_effective(&self, now: OffsetDateTime) -> bool {
        self.is_active && self.expires_at.map_or(true, |expires| expires > now)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BanStatus {
    pub is_banned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ban_type: Option<BanType>,
    #[serde(with = "time::serde::rfc3339::option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<OffsetDateTime>,
}

impl BanStatus {
    pub fn not_banned() -> Self {
        Self {
            is_banned: false,
            ban_type: None,
            expires_at: None,
        }
    }
}

/// One row of the automated-decision audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct ModerationRecord {
    pub id: Uuid,
    pub content_type: String,
    pub content_id: Uuid,
    pub user_id: Uuid,
    pub action: ModerationAction,
    pub violations: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
