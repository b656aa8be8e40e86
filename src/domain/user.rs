use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The only owner fields projected into a post read.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerSummary {
    pub username: String,
    pub avatar: Option<String>,
}
