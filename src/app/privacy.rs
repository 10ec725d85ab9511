use anyhow::{anyhow, Result};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::visibility::{EngagementPolicy, PrivacySettings, ProfileVisibility};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct PrivacyService {
    db: Db,
}

impl PrivacyService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// A user without a settings row gets the defaults.
    pub async fn get(&self, user_id: Uuid) -> Result<PrivacySettings> {
        let row = sqlx::query(
            "SELECT user_id, profile_visibility, who_can_react, who_can_comment \
             FROM privacy_settings WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let settings = match row {
            Some(row) => parse_settings_row(&row)?,
            None => PrivacySettings::defaults(user_id),
        };

        Ok(settings)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        profile_visibility: Option<ProfileVisibility>,
        who_can_react: Option<EngagementPolicy>,
        who_can_comment: Option<EngagementPolicy>,
    ) -> Result<PrivacySettings> {
        let row = sqlx::query(
            "INSERT INTO privacy_settings (user_id, profile_visibility, who_can_react, who_can_comment) \
             VALUES ($1, COALESCE($2, 'university'), COALESCE($3, 'everyone'), COALESCE($4, 'everyone')) \
             ON CONFLICT (user_id) DO UPDATE \
             SET profile_visibility = COALESCE($2, privacy_settings.profile_visibility), \
                 who_can_react = COALESCE($3, privacy_settings.who_can_react), \
                 who_can_comment = COALESCE($4, privacy_settings.who_can_comment), \
                 updated_at = NOW() \
             RETURNING user_id, profile_visibility, who_can_react, who_can_comment",
        )
        .bind(user_id)
        .bind(profile_visibility.map(|v| v.as_db()))
        .bind(who_can_react.map(|p| p.as_db()))
        .bind(who_can_comment.map(|p| p.as_db()))
        .fetch_one(self.db.pool())
        .await?;

        parse_settings_row(&row)
    }
}

fn parse_settings_row(row: &sqlx::postgres::PgRow) -> Result<PrivacySettings> {
    let profile_visibility: String = row.get("profile_visibility");
    let who_can_react: String = row.get("who_can_react");
    let who_can_comment: String = row.get("who_can_comment");

    Ok(PrivacySettings {
        user_id: row.get("user_id"),
        profile_visibility: ProfileVisibility::from_db(&profile_visibility)
            .ok_or_else(|| anyhow!("unknown profile visibility: {}", profile_visibility))?,
        who_can_react: EngagementPolicy::from_db(&who_can_react)
            .ok_or_else(|| anyhow!("unknown engagement policy: {}", who_can_react))?,
        who_can_comment: EngagementPolicy::from_db(&who_can_comment)
            .ok_or_else(|| anyhow!("unknown engagement policy: {}", who_can_comment))?,
    })
}
