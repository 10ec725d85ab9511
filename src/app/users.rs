use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// `None` when the handle is already taken.
    pub async fn create_user(
        &self,
        handle: String,
        display_name: String,
        university: String,
    ) -> Result<Option<User>> {
        let row = sqlx::query(
            "INSERT INTO users (handle, display_name, university) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (handle) DO NOTHING \
             RETURNING id, handle, display_name, university, created_at",
        )
        .bind(handle)
        .bind(display_name)
        .bind(university)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            handle: row.get("handle"),
            display_name: row.get("display_name"),
            university: row.get("university"),
            created_at: row.get("created_at"),
        }))
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, handle, display_name, university, created_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            handle: row.get("handle"),
            display_name: row.get("display_name"),
            university: row.get("university"),
            created_at: row.get("created_at"),
        }))
    }
}
