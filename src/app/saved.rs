use anyhow::Result;
use uuid::Uuid;

use crate::app::posts::post_from_row;
use crate::domain::post::Post;
use crate::infra::db::Db;

/// Bookmark ledger: which user has saved which post.
#[derive(Clone)]
pub struct SavedPostService {
    db: Db,
}

impl SavedPostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn is_saved(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        let saved: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM saved_posts WHERE user_id = $1 AND post_id = $2)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(saved)
    }

    /// Flips the bookmark. Returns the new state, or `None` when the post
    /// does not exist.
    pub async fn toggle(&self, user_id: Uuid, post_id: Uuid) -> Result<Option<bool>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        if !exists {
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM saved_posts WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(self.db.pool())
            .await?;
        if removed.rows_affected() > 0 {
            return Ok(Some(false));
        }

        let inserted = sqlx::query(
            "INSERT INTO saved_posts (user_id, post_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(post_id)
        .execute(self.db.pool())
        .await;

        match inserted {
            Ok(_) => Ok(Some(true)),
            // The post was deleted between the exists-check and the insert.
            Err(err) if is_foreign_key_violation(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn list_saved(&self, user_id: Uuid) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT p.id, p.owner_id, p.title, p.price, p.images, p.address, p.city, \
                    p.bedroom, p.bathroom, p.latitude, p.longitude, p.listing_type, \
                    p.property, p.created_at \
             FROM saved_posts s \
             JOIN posts p ON p.id = s.post_id \
             WHERE s.user_id = $1 \
             ORDER BY s.created_at DESC, p.id DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(post_from_row).collect()
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_foreign_key_violation(),
        _ => false,
    }
}
