//! # Authentication & Authorization
//!
//! OAuth2 password-grant style bearer tokens with per-route scopes.
//!
//! ## Token Format
//!
//! HS256 JWTs carrying the claims in [`Claims`]. Tokens are issued by
//! `POST /v1/users/token` and validated by [`auth_middleware`] on every
//! other `/v1` route.
//!
//! ## CallerIdentity
//!
//! The middleware resolves the token's user against the user store and
//! injects a [`CallerIdentity`] with the scopes **as currently stored**, so
//! revoking a scope takes effect before the token expires. Handlers extract
//! it via the `FromRequestParts` impl and call [`require_scope`].

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{Request, State};
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::AppError;
use crate::state::AppState;

const CREDENTIALS_REJECTED: &str = "could not validate credentials";

// ── Secrets ─────────────────────────────────────────────────────────────────

/// HS256 signing secret.
///
/// Custom `Debug` redacts the key material. The bytes are zeroed on drop.
pub struct JwtSecret(Zeroizing<Vec<u8>>);

impl JwtSecret {
    /// Wrap an existing secret.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Generate 32 random bytes from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new(vec![0u8; 32]);
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.0)
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.0)
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtSecret([REDACTED])")
    }
}

// ── Tokens ──────────────────────────────────────────────────────────────────

/// Longest token lifetime accepted, one week.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;

/// Access token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username.
    pub sub: String,
    /// User id.
    pub uid: i64,
    /// Display name.
    pub name: String,
    /// Scopes granted at issue time.
    pub scopes: Vec<String>,
    /// Issued at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl Claims {
    /// Claims for a token issued at `issued_at` that lives `ttl_minutes`,
    /// clamped to `1..=MAX_TOKEN_TTL_MINUTES`.
    pub fn new(
        uid: i64,
        username: impl Into<String>,
        name: impl Into<String>,
        scopes: Vec<String>,
        issued_at: DateTime<Utc>,
        ttl_minutes: i64,
    ) -> Self {
        Self {
            sub: username.into(),
            uid,
            name: name.into(),
            scopes,
            iat: issued_at.timestamp(),
            exp: issued_at
                .timestamp()
                .saturating_add(ttl_minutes.clamp(1, MAX_TOKEN_TTL_MINUTES) * 60),
        }
    }
}

/// Sign `claims` with HS256.
pub fn issue_token(secret: &JwtSecret, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &secret.encoding_key())
}

/// Verify signature and expiry, returning the claims.
pub fn decode_token(secret: &JwtSecret, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    jsonwebtoken::decode::<Claims>(token, &secret.decoding_key(), &validation).map(|d| d.claims)
}

// ── Passwords ───────────────────────────────────────────────────────────────

/// Hash a password into an argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
}

/// Check a password against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// The authenticated caller, as stored at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: i64,
    pub username: String,
    pub name: String,
    pub scopes: Vec<String>,
    pub active: bool,
}

/// Extracts the identity that the auth middleware injected into extensions.
/// Returns 401 if no identity is present.
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(CREDENTIALS_REJECTED.into()))
    }
}

/// Check the caller holds one of `required` and is active.
///
/// Scopes are checked first (403), then the active flag (400). An empty
/// `required` only checks the active flag.
pub fn require_scope(caller: &CallerIdentity, required: &[&str]) -> Result<(), AppError> {
    if !nomina_core::grants(&caller.scopes, required) {
        return Err(AppError::Forbidden("insufficient privileges".into()));
    }
    if !caller.active {
        return Err(AppError::BadRequest("inactive user".into()));
    }
    Ok(())
}

// ── Middleware ───────────────────────────────────────────────────────────────

fn bearer_token(request: &Request) -> Result<&str, &'static str> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or("missing authorization header")?
        .to_str()
        .map_err(|_| "authorization header is not valid text")?;
    let (scheme, token) = value
        .split_once(' ')
        .ok_or("authorization header must use Bearer scheme")?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err("authorization header must use Bearer scheme");
    }
    Ok(token.trim())
}

/// Validate the bearer token and inject the caller's [`CallerIdentity`].
///
/// Every failure is reported to the client as the same 401; the log line
/// carries the actual reason.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(&request) {
        Ok(token) => token,
        Err(reason) => {
            tracing::warn!(reason, "authentication failed");
            return AppError::Unauthorized(CREDENTIALS_REJECTED.into()).into_response();
        }
    };

    let claims = match decode_token(&state.jwt, token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "authentication failed: token rejected");
            return AppError::Unauthorized(CREDENTIALS_REJECTED.into()).into_response();
        }
    };

    let user = match state.users.get(claims.uid) {
        Some(user) if user.username == claims.sub => user,
        _ => {
            tracing::warn!(user_id = claims.uid, "authentication failed: unknown user");
            return AppError::Unauthorized(CREDENTIALS_REJECTED.into()).into_response();
        }
    };

    request.extensions_mut().insert(CallerIdentity {
        user_id: user.id,
        username: user.username,
        name: user.name,
        scopes: user.scopes,
        active: user.active,
    });
    next.run(request).await
}
