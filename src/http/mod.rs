use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::{AuthUser, MaybeAuthUser, TOKEN_COOKIE};
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .nest(
            "/api",
            Router::new()
                .merge(routes::auth())
                .merge(routes::posts())
                .merge(routes::users()),
        )
        .with_state(state)
}

/// Credentialed CORS for the single configured frontend origin. Cookies are
/// allowed across this origin only, never a wildcard.
pub fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin = origin.parse::<HeaderValue>()?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}
