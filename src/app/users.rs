use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::app::auth::{hash_password, is_unique_violation};
use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug)]
pub enum ProfileUpdateOutcome {
    Updated(User),
    NotFound,
    Conflict,
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, avatar, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            avatar: row.get("avatar"),
            created_at: row.get("created_at"),
        }))
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
    ) -> Result<ProfileUpdateOutcome> {
        let password_hash = match changes.password.as_deref() {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        let row = sqlx::query(
            "UPDATE users SET \
                username = COALESCE($2, username), \
                email = COALESCE($3, email), \
                avatar = COALESCE($4, avatar), \
                password_hash = COALESCE($5, password_hash) \
             WHERE id = $1 \
             RETURNING id, username, email, avatar, created_at",
        )
        .bind(user_id)
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.avatar)
        .bind(password_hash)
        .fetch_optional(self.db.pool())
        .await;

        let row = match row {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => return Ok(ProfileUpdateOutcome::Conflict),
            Err(err) => return Err(err.into()),
        };

        Ok(match row {
            Some(row) => ProfileUpdateOutcome::Updated(User {
                id: row.get("id"),
                username: row.get("username"),
                email: row.get("email"),
                avatar: row.get("avatar"),
                created_at: row.get("created_at"),
            }),
            None => ProfileUpdateOutcome::NotFound,
        })
    }
}
