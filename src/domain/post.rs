use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::OwnerSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub price: i64,
    pub images: Vec<String>,
    pub address: String,
    pub city: String,
    pub bedroom: i32,
    pub bathroom: i32,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    pub property: PropertyKind,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Free-form descriptive payload attached one-to-one to a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    pub id: Uuid,
    pub post_id: Uuid,
    pub description: String,
    pub utilities: Option<String>,
    pub pet: Option<String>,
    pub income: Option<String>,
    pub size: Option<i32>,
    pub school: Option<i32>,
    pub bus: Option<i32>,
    pub restaurant: Option<i32>,
}

/// Single-post read shape: the post plus its detail, an owner summary,
/// and whether the requesting user has saved it.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub detail: PostDetail,
    pub owner: OwnerSummary,
    pub is_saved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Buy,
    Rent,
}

impl ListingType {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "buy" => Some(Self::Buy),
            "rent" => Some(Self::Rent),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Rent => "rent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Apartment,
    House,
    Condo,
    Land,
}

impl PropertyKind {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "apartment" => Some(Self::Apartment),
            "house" => Some(Self::House),
            "condo" => Some(Self::Condo),
            "land" => Some(Self::Land),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Apartment => "apartment",
            Self::House => "house",
            Self::Condo => "condo",
            Self::Land => "land",
        }
    }
}
