use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::app::auth::TokenVerifier;
use crate::http::AppError;
use crate::AppState;

pub const TOKEN_COOKIE: &str = "token";

/// Required credential: rejects with 401 when the token is missing or does
/// not verify.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Optional credential for read paths: a missing or invalid token both
/// degrade to an anonymous view instead of rejecting the request.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<Uuid>);

/// Bearer header first, then the `token` cookie.
fn extract_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    let jar = CookieJar::from_headers(&parts.headers);
    jar.get(TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)
            .ok_or_else(|| AppError::unauthorized("missing credential"))?;

        let verifier = TokenVerifier::new(state.token_key);
        let user_id = verifier
            .verify(&token)
            .ok_or_else(|| AppError::unauthorized("invalid credential"))?;

        Ok(AuthUser { user_id })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let verifier = TokenVerifier::new(state.token_key);
        let user_id = extract_token(parts).and_then(|token| verifier.verify(&token));
        Ok(MaybeAuthUser(user_id))
    }
}
