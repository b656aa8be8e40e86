use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::app::auth::AuthService;
use crate::app::posts::{
    DeleteOutcome, DetailChanges, ListFilter, NewPost, NewPostDetail, PostChanges, PostService,
    UpdateOutcome,
};
use crate::app::saved::SavedPostService;
use crate::app::users::{ProfileChanges, ProfileUpdateOutcome, UserService};
use crate::domain::post::{ListingType, Post, PostView, PropertyKind};
use crate::domain::user::User;
use crate::http::{AppError, AuthUser, MaybeAuthUser, TOKEN_COOKIE};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
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
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    const MAX_PASSWORD_LEN: usize = 128;

    if payload.username.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.password.trim().is_empty()
    {
        return Err(AppError::bad_request(
            "username, email and password are required",
        ));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "password must be at most 128 characters",
        ));
    }

    let service = AuthService::new(state.db.clone(), state.token_key, state.token_ttl_days);
    let user = service
        .register(payload.username, payload.email, payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to register user");
            AppError::internal("failed to register")
        })?;

    match user {
        Some(user) => Ok((StatusCode::CREATED, Json(user))),
        None => Err(AppError::conflict("username or email already taken")),
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<User>), AppError> {
    if payload.username.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }

    let service = AuthService::new(state.db.clone(), state.token_key, state.token_ttl_days);
    let login = service
        .login(&payload.username, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    let (user, issued) = match login {
        Some(login) => login,
        None => return Err(AppError::unauthorized("invalid credentials")),
    };

    let cookie = Cookie::build((TOKEN_COOKIE, issued.token))
        .path("/")
        .http_only(true)
        .secure(state.cookie_secure)
        .same_site(SameSite::None)
        .max_age(time::Duration::days(state.token_ttl_days as i64))
        .build();

    Ok((jar.add(cookie), Json(user)))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    let cookie = Cookie::build(TOKEN_COOKIE).path("/").build();
    (
        jar.remove(cookie),
        Json(MessageResponse {
            message: "logged out".to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

// Filter parameters arrive text-encoded; empty strings mean "no constraint".
#[derive(Deserialize)]
pub struct ListPostsQuery {
    pub city: Option<String>,
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
    pub property: Option<String>,
    pub bedroom: Option<String>,
    #[serde(rename = "minPrice")]
    pub min_price: Option<String>,
    #[serde(rename = "maxPrice")]
    pub max_price: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn parse_number<T>(field: &str, value: Option<String>) -> Result<Option<T>, AppError>
where
    T: FromStr,
{
    match non_empty(value) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::bad_request(format!("invalid {}", field))),
        None => Ok(None),
    }
}

impl ListPostsQuery {
    fn into_filter(self) -> Result<ListFilter, AppError> {
        let listing_type = match non_empty(self.listing_type) {
            Some(raw) => Some(
                ListingType::from_db(&raw).ok_or_else(|| AppError::bad_request("invalid type"))?,
            ),
            None => None,
        };
        let property = match non_empty(self.property) {
            Some(raw) => Some(
                PropertyKind::from_db(&raw)
                    .ok_or_else(|| AppError::bad_request("invalid property"))?,
            ),
            None => None,
        };

        Ok(ListFilter {
            city: non_empty(self.city),
            listing_type,
            property,
            bedroom: parse_number("bedroom", self.bedroom)?,
            min_price: parse_number("minPrice", self.min_price)?,
            max_price: parse_number("maxPrice", self.max_price)?,
        })
    }
}

pub async fn list_posts(
    Query(query): Query<ListPostsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Post>>, AppError> {
    let filter = query.into_filter()?;

    let service = PostService::new(state.db.clone());
    let posts = service.list(&filter).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list posts");
        AppError::internal("failed to get posts")
    })?;

    Ok(Json(posts))
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
) -> Result<Json<PostView>, AppError> {
    let service = PostService::new(state.db.clone());
    let fetched = service.get(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to fetch post");
        AppError::internal("failed to get post")
    })?;

    let fetched = match fetched {
        Some(fetched) => fetched,
        None => return Err(AppError::not_found("post not found")),
    };

    // Anonymous or unverified viewers see is_saved = false.
    let is_saved = match viewer.0 {
        Some(user_id) => SavedPostService::new(state.db.clone())
            .is_saved(user_id, id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, post_id = %id, "failed to check saved state");
                AppError::internal("failed to get post")
            })?,
        None => false,
    };

    Ok(Json(PostView {
        post: fetched.post,
        detail: fetched.detail,
        owner: fetched.owner,
        is_saved,
    }))
}

#[derive(Deserialize)]
pub struct AddPostRequest {
    #[serde(rename = "postData")]
    pub post_data: NewPost,
    #[serde(rename = "postDetail")]
    pub post_detail: NewPostDetail,
}

pub async fn add_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AddPostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    if payload.post_data.price < 0 {
        return Err(AppError::bad_request("price must be non-negative"));
    }
    if payload.post_data.bedroom < 0 || payload.post_data.bathroom < 0 {
        return Err(AppError::bad_request("room counts must be non-negative"));
    }

    let service = PostService::new(state.db.clone());
    let post = service
        .create(auth.user_id, payload.post_data, payload.post_detail)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, owner_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    #[serde(rename = "postData", default)]
    pub post_data: PostChanges,
    #[serde(rename = "postDetail", default)]
    pub post_detail: DetailChanges,
}

pub async fn update_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    if payload.post_data.price.is_some_and(|price| price < 0) {
        return Err(AppError::bad_request("price must be non-negative"));
    }
    if payload.post_data.bedroom.is_some_and(|n| n < 0)
        || payload.post_data.bathroom.is_some_and(|n| n < 0)
    {
        return Err(AppError::bad_request("room counts must be non-negative"));
    }

    let service = PostService::new(state.db.clone());
    let outcome = service
        .update(id, auth.user_id, payload.post_data, payload.post_detail)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to update post");
            AppError::internal("failed to update post")
        })?;

    match outcome {
        UpdateOutcome::Updated(post) => Ok(Json(post)),
        UpdateOutcome::NotFound => Err(AppError::not_found("post not found")),
        UpdateOutcome::Forbidden => Err(AppError::forbidden("not authorized to update")),
    }
}

pub async fn delete_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    let service = PostService::new(state.db.clone());
    let outcome = service.delete(id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to delete post");
        AppError::internal("failed to delete post")
    })?;

    match outcome {
        DeleteOutcome::Deleted => Ok(Json(MessageResponse {
            message: "post deleted".to_string(),
        })),
        DeleteOutcome::NotFound => Err(AppError::not_found("post not found")),
        DeleteOutcome::Forbidden => Err(AppError::forbidden("not authorized to delete")),
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub async fn current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let service = UserService::new(state.db.clone());
    let user = service.get(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch user");
        AppError::internal("failed to get user")
    })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub password: Option<String>,
}

pub async fn update_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    if id != auth.user_id {
        return Err(AppError::forbidden("not authorized to update"));
    }

    let service = UserService::new(state.db.clone());
    let outcome = service
        .update_profile(
            id,
            ProfileChanges {
                username: payload.username,
                email: payload.email,
                avatar: payload.avatar,
                password: payload.password,
            },
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to update user");
            AppError::internal("failed to update user")
        })?;

    match outcome {
        ProfileUpdateOutcome::Updated(user) => Ok(Json(user)),
        ProfileUpdateOutcome::NotFound => Err(AppError::not_found("user not found")),
        ProfileUpdateOutcome::Conflict => {
            Err(AppError::conflict("username or email already taken"))
        }
    }
}

#[derive(Deserialize)]
pub struct SavePostRequest {
    #[serde(rename = "postId")]
    pub post_id: Uuid,
}

#[derive(Serialize)]
pub struct SavePostResponse {
    pub saved: bool,
}

pub async fn toggle_saved_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SavePostRequest>,
) -> Result<Json<SavePostResponse>, AppError> {
    let service = SavedPostService::new(state.db.clone());
    let saved = service
        .toggle(auth.user_id, payload.post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %payload.post_id, "failed to toggle saved post");
            AppError::internal("failed to save post")
        })?;

    match saved {
        Some(saved) => Ok(Json(SavePostResponse { saved })),
        None => Err(AppError::not_found("post not found")),
    }
}

#[derive(Serialize)]
pub struct ProfilePostsResponse {
    pub user_posts: Vec<Post>,
    pub saved_posts: Vec<Post>,
}

pub async fn profile_posts(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ProfilePostsResponse>, AppError> {
    let posts = PostService::new(state.db.clone());
    let saved = SavedPostService::new(state.db.clone());

    let user_posts = posts.list_by_owner(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list user posts");
        AppError::internal("failed to get profile posts")
    })?;
    let saved_posts = saved.list_saved(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list saved posts");
        AppError::internal("failed to get profile posts")
    })?;

    Ok(Json(ProfilePostsResponse {
        user_posts,
        saved_posts,
    }))
}
