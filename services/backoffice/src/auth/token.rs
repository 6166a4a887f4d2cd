//! HS256 session tokens.
//!
//! # Purpose
//! Verifies bearer tokens and turns their `userId` / `userRole` claims into an
//! [`Identity`]. Verified tokens are memoized until they expire so repeated
//! requests skip signature checks.
//!
//! # Security considerations
//! - Only HS256 is accepted; the algorithm in the header must match.
//! - `exp` is required and validated with a small leeway.
use bastion_rbac::Identity;
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

const LEEWAY_SECS: u64 = 5;
const MAX_CACHED_TOKENS: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackofficeClaims {
    #[serde(rename = "userId")]
    pub user_id: u64,
    #[serde(rename = "userRole")]
    pub user_role: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is empty")]
    Missing,
    #[error("token is invalid: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("signing secret is empty")]
    EmptySecret,
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

/// Sign a token for `subject_id` acting as `role`.
pub fn mint_token(
    secret: &str,
    subject_id: u64,
    role: &str,
    ttl: Duration,
) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::EmptySecret);
    }
    let now = now_epoch_seconds();
    let claims = BackofficeClaims {
        user_id: subject_id,
        user_role: role.to_string(),
        iat: now,
        exp: now + ttl.as_secs() as i64,
    };
    Ok(jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Accepts `Bearer <token>` as well as a bare token.
pub fn extract_bearer(headers: &axum::http::HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?;
    let value = value.to_str().ok()?.trim();
    let token = match value.split_once(' ') {
        Some(("Bearer", rest)) => rest.trim(),
        _ if value == "Bearer" => "",
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

#[derive(Clone)]
struct CachedIdentity {
    identity: Identity,
    expires_at: i64,
}

#[derive(Clone)]
pub struct TokenVerifier {
    decoding: DecodingKey,
    validation: Validation,
    cache: Arc<DashMap<String, CachedIdentity>>,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;
        validation.set_required_spec_claims(&["exp"]);
        Ok(Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            cache: Arc::new(DashMap::new()),
        })
    }

    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Missing);
        }
        let now = now_epoch_seconds();
        if let Some(cached) = self.cache.get(token) {
            if cached.expires_at > now {
                return Ok(cached.identity.clone());
            }
        }
        self.cache.remove(token);

        let data = jsonwebtoken::decode::<BackofficeClaims>(token, &self.decoding, &self.validation)?;
        let identity = Identity::new(data.claims.user_id, data.claims.user_role);
        if self.cache.len() >= MAX_CACHED_TOKENS {
            self.cache.retain(|_, cached| cached.expires_at > now);
            if self.cache.len() >= MAX_CACHED_TOKENS {
                self.cache.clear();
            }
        }
        self.cache.insert(
            token.to_string(),
            CachedIdentity {
                identity: identity.clone(),
                expires_at: data.claims.exp,
            },
        );
        Ok(identity)
    }

    pub fn cached_tokens(&self) -> usize {
        self.cache.len()
    }
}
