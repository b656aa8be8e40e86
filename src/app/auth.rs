use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::user::User;
use crate::infra::db::Db;

const TOKEN_ISSUER: &str = "abode";

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Stateless credential check: decrypts a v4.local token against the server
/// key and yields the subject id. No I/O, deterministic for a given token.
#[derive(Clone)]
pub struct TokenVerifier {
    key: [u8; 32],
}

impl TokenVerifier {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn verify(&self, token: &str) -> Option<Uuid> {
        let key = SymmetricKey::<V4>::from(&self.key).ok()?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let untrusted = UntrustedToken::<Local, V4>::try_from(token).ok()?;
        let trusted = local::decrypt(&key, &untrusted, &rules, None, None).ok()?;
        let claims = trusted.payload_claims()?;
        let subject = claims.get_claim("sub").and_then(|value| value.as_str())?;
        Uuid::parse_str(subject).ok()
    }
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    token_key: [u8; 32],
    token_ttl_days: u64,
}

impl AuthService {
    pub fn new(db: Db, token_key: [u8; 32], token_ttl_days: u64) -> Self {
        Self {
            db,
            token_key,
            token_ttl_days,
        }
    }

    /// Creates a new account. Returns `None` when the username or email is
    /// already taken.
    pub async fn register(
        &self,
        username: String,
        email: String,
        password: String,
    ) -> Result<Option<User>> {
        let password_hash = hash_password(&password)?;
        let row = sqlx::query(
            "INSERT INTO users (username, email, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING id, username, email, avatar, created_at",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(self.db.pool())
        .await;

        let row = match row {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            avatar: row.get("avatar"),
            created_at: row.get("created_at"),
        }))
    }

    /// Verifies credentials and issues a token. Returns `None` on an unknown
    /// username or a wrong password.
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<(User, IssuedToken)>> {
        let row = sqlx::query(
            "SELECT id, username, email, avatar, password_hash, created_at \
             FROM users WHERE username = $1 OR email = $1",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let password_hash: String = row.get("password_hash");
        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        let user = User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            avatar: row.get("avatar"),
            created_at: row.get("created_at"),
        };
        let token = self.issue_token(user.id)?;
        Ok(Some((user, token)))
    }

    pub fn issue_token(&self, user_id: Uuid) -> Result<IssuedToken> {
        let ttl = std::time::Duration::from_secs(self.token_ttl_days * 24 * 60 * 60);
        let mut claims = Claims::new_expires_in(&ttl)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;

        let key = SymmetricKey::<V4>::from(&self.token_key)?;
        let token = local::encrypt(&key, &claims, None, None)?;
        let expires_at = OffsetDateTime::now_utc() + Duration::days(self.token_ttl_days as i64);
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verifier(&self) -> TokenVerifier {
        TokenVerifier::new(self.token_key)
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
