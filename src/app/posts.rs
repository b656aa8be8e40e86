use anyhow::{anyhow, Result};
use serde::Deserialize;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::post::{ListingType, Post, PostDetail, PropertyKind};
use crate::domain::user::OwnerSummary;
use crate::infra::db::Db;

/// Listing filter. Absent fields constrain nothing.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub city: Option<String>,
    pub listing_type: Option<ListingType>,
    pub property: Option<PropertyKind>,
    pub bedroom: Option<i32>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub price: i64,
    #[serde(default)]
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
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPostDetail {
    pub description: String,
    pub utilities: Option<String>,
    pub pet: Option<String>,
    pub income: Option<String>,
    pub size: Option<i32>,
    pub school: Option<i32>,
    pub bus: Option<i32>,
    pub restaurant: Option<i32>,
}

/// Partial-merge update: absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostChanges {
    pub title: Option<String>,
    pub price: Option<i64>,
    pub images: Option<Vec<String>>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub bedroom: Option<i32>,
    pub bathroom: Option<i32>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    #[serde(rename = "type")]
    pub listing_type: Option<ListingType>,
    pub property: Option<PropertyKind>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailChanges {
    pub description: Option<String>,
    pub utilities: Option<String>,
    pub pet: Option<String>,
    pub income: Option<String>,
    pub size: Option<i32>,
    pub school: Option<i32>,
    pub bus: Option<i32>,
    pub restaurant: Option<i32>,
}

#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Forbidden,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(Post),
    NotFound,
    Forbidden,
}

/// A fetched post with its detail and owner summary, before the saved-flag
/// annotation is applied.
#[derive(Debug, Clone)]
pub struct FetchedPost {
    pub post: Post,
    pub detail: PostDetail,
    pub owner: OwnerSummary,
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

const POST_COLUMNS: &str = "p.id, p.owner_id, p.title, p.price, p.images, p.address, p.city, \
     p.bedroom, p.bathroom, p.latitude, p.longitude, p.listing_type, p.property, p.created_at";

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &ListFilter) -> Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts p \
             WHERE ($1::text IS NULL OR p.city = $1) \
               AND ($2::text IS NULL OR p.listing_type = $2) \
               AND ($3::text IS NULL OR p.property = $3) \
               AND ($4::int IS NULL OR p.bedroom = $4) \
               AND ($5::bigint IS NULL OR p.price >= $5) \
               AND ($6::bigint IS NULL OR p.price <= $6) \
             ORDER BY p.created_at DESC, p.id DESC",
        ))
        .bind(filter.city.as_deref())
        .bind(filter.listing_type.map(|t| t.as_db()))
        .bind(filter.property.map(|p| p.as_db()))
        .bind(filter.bedroom)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(post_from_row).collect()
    }

    pub async fn get(&self, post_id: Uuid) -> Result<Option<FetchedPost>> {
        let row = sqlx::query(&format!(
            "SELECT {POST_COLUMNS}, \
                    u.username AS owner_username, u.avatar AS owner_avatar, \
                    d.id AS detail_id, d.description, d.utilities, d.pet, d.income, \
                    d.size, d.school, d.bus, d.restaurant \
             FROM posts p \
             JOIN users u ON p.owner_id = u.id \
             JOIN post_details d ON d.post_id = p.id \
             WHERE p.id = $1",
        ))
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let post = post_from_row(&row)?;
        let detail = PostDetail {
            id: row.get("detail_id"),
            post_id: post.id,
            description: row.get("description"),
            utilities: row.get("utilities"),
            pet: row.get("pet"),
            income: row.get("income"),
            size: row.get("size"),
            school: row.get("school"),
            bus: row.get("bus"),
            restaurant: row.get("restaurant"),
        };
        let owner = OwnerSummary {
            username: row.get("owner_username"),
            avatar: row.get("owner_avatar"),
        };

        Ok(Some(FetchedPost {
            post,
            detail,
            owner,
        }))
    }

    /// Inserts the post and its detail in one transaction. If the detail
    /// insert fails the post does not persist.
    pub async fn create(
        &self,
        owner_id: Uuid,
        post: NewPost,
        detail: NewPostDetail,
    ) -> Result<Post> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(
            "INSERT INTO posts (owner_id, title, price, images, address, city, bedroom, \
                                bathroom, latitude, longitude, listing_type, property) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING id, owner_id, title, price, images, address, city, bedroom, \
                       bathroom, latitude, longitude, listing_type, property, created_at",
        )
        .bind(owner_id)
        .bind(post.title)
        .bind(post.price)
        .bind(post.images)
        .bind(post.address)
        .bind(post.city)
        .bind(post.bedroom)
        .bind(post.bathroom)
        .bind(post.latitude)
        .bind(post.longitude)
        .bind(post.listing_type.as_db())
        .bind(post.property.as_db())
        .fetch_one(&mut *tx)
        .await?;
        let created = post_from_row(&row)?;

        sqlx::query(
            "INSERT INTO post_details (post_id, description, utilities, pet, income, \
                                       size, school, bus, restaurant) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(created.id)
        .bind(detail.description)
        .bind(detail.utilities)
        .bind(detail.pet)
        .bind(detail.income)
        .bind(detail.size)
        .bind(detail.school)
        .bind(detail.bus)
        .bind(detail.restaurant)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    pub async fn update(
        &self,
        post_id: Uuid,
        requester_id: Uuid,
        changes: PostChanges,
        detail_changes: DetailChanges,
    ) -> Result<UpdateOutcome> {
        let mut tx = self.db.pool().begin().await?;

        // FOR UPDATE holds the row against a concurrent delete until commit.
        let owner_id: Option<Uuid> =
            sqlx::query_scalar("SELECT owner_id FROM posts WHERE id = $1 FOR UPDATE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;
        match owner_id {
            None => return Ok(UpdateOutcome::NotFound),
            Some(owner) if owner != requester_id => return Ok(UpdateOutcome::Forbidden),
            Some(_) => {}
        }

        let row = sqlx::query(
            "UPDATE posts SET \
                title = COALESCE($2, title), \
                price = COALESCE($3, price), \
                images = COALESCE($4, images), \
                address = COALESCE($5, address), \
                city = COALESCE($6, city), \
                bedroom = COALESCE($7, bedroom), \
                bathroom = COALESCE($8, bathroom), \
                latitude = COALESCE($9, latitude), \
                longitude = COALESCE($10, longitude), \
                listing_type = COALESCE($11, listing_type), \
                property = COALESCE($12, property) \
             WHERE id = $1 \
             RETURNING id, owner_id, title, price, images, address, city, bedroom, \
                       bathroom, latitude, longitude, listing_type, property, created_at",
        )
        .bind(post_id)
        .bind(changes.title)
        .bind(changes.price)
        .bind(changes.images)
        .bind(changes.address)
        .bind(changes.city)
        .bind(changes.bedroom)
        .bind(changes.bathroom)
        .bind(changes.latitude)
        .bind(changes.longitude)
        .bind(changes.listing_type.map(|t| t.as_db()))
        .bind(changes.property.map(|p| p.as_db()))
        .fetch_optional(&mut *tx)
        .await?;

        // A delete that committed before the ownership read took its lock
        // leaves nothing to update.
        let row = match row {
            Some(row) => row,
            None => return Ok(UpdateOutcome::NotFound),
        };
        let updated = post_from_row(&row)?;

        sqlx::query(
            "UPDATE post_details SET \
                description = COALESCE($2, description), \
                utilities = COALESCE($3, utilities), \
                pet = COALESCE($4, pet), \
                income = COALESCE($5, income), \
                size = COALESCE($6, size), \
                school = COALESCE($7, school), \
                bus = COALESCE($8, bus), \
                restaurant = COALESCE($9, restaurant) \
             WHERE post_id = $1",
        )
        .bind(post_id)
        .bind(detail_changes.description)
        .bind(detail_changes.utilities)
        .bind(detail_changes.pet)
        .bind(detail_changes.income)
        .bind(detail_changes.size)
        .bind(detail_changes.school)
        .bind(detail_changes.bus)
        .bind(detail_changes.restaurant)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(UpdateOutcome::Updated(updated))
    }

    /// Ownership is checked before the delete statement runs; an unauthorized
    /// request never reaches the delete. The detail row goes with the post
    /// via the FK cascade.
    pub async fn delete(&self, post_id: Uuid, requester_id: Uuid) -> Result<DeleteOutcome> {
        let owner_id: Option<Uuid> = sqlx::query_scalar("SELECT owner_id FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        match owner_id {
            None => return Ok(DeleteOutcome::NotFound),
            Some(owner) if owner != requester_id => return Ok(DeleteOutcome::Forbidden),
            Some(_) => {}
        }

        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(self.db.pool())
            .await?;

        // A concurrent delete may have won the race after the ownership read.
        if result.rows_affected() == 0 {
            return Ok(DeleteOutcome::NotFound);
        }
        Ok(DeleteOutcome::Deleted)
    }

    pub async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts p \
             WHERE p.owner_id = $1 \
             ORDER BY p.created_at DESC, p.id DESC",
        ))
        .bind(owner_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(post_from_row).collect()
    }
}

pub(crate) fn post_from_row(row: &PgRow) -> Result<Post> {
    let listing_type: String = row.get("listing_type");
    let listing_type = ListingType::from_db(&listing_type)
        .ok_or_else(|| anyhow!("unknown listing type: {}", listing_type))?;
    let property: String = row.get("property");
    let property = PropertyKind::from_db(&property)
        .ok_or_else(|| anyhow!("unknown property kind: {}", property))?;

    Ok(Post {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        price: row.get("price"),
        images: row.get("images"),
        address: row.get("address"),
        city: row.get("city"),
        bedroom: row.get("bedroom"),
        bathroom: row.get("bathroom"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        listing_type,
        property,
        created_at: row.get("created_at"),
    })
}
