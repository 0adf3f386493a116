use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::server::AppState;
use crate::utils::error::ServerError;

/// Roles known to the system. Authorization checks compare against this
/// closed set; handlers never match on raw role strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "owner")]
    Owner,
    #[serde(rename = "kasir")]
    Cashier,
    #[serde(rename = "admin_gudang")]
    WarehouseAdmin,
    #[serde(rename = "finance")]
    Finance,
}

/// Identity payload carried by a bearer token.
///
/// Each identity claim is decoded defensively: a missing or mistyped
/// value leaves the field `None` instead of failing the whole token.
/// Callers decide which claims they require.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, deserialize_with = "lenient")]
    pub user_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub role: Option<Role>,
    #[serde(default)]
    pub iat: Option<i64>,
    pub exp: i64,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header required")]
    MissingCredential,

    #[error("Invalid authorization header format")]
    Malformed,

    #[error("Invalid token signature")]
    SignatureInvalid,

    #[error("Token expired")]
    Expired,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Insufficient permissions")]
    Forbidden,
}

/// Verifies bearer credentials against the shared HS256 secret.
///
/// Pure given the secret: no shared state, safe to call from any task.
pub struct TokenValidator {
    decoding: DecodingKey,
    validation: Validation,
    allow_bare_token: bool,
}

impl TokenValidator {
    pub fn new(secret: &str, allow_bare_token: bool) -> Self {
        // Pinning the algorithm family rejects tokens that swap the `alg`
        // header while keeping the same key.
        let validation = Validation::new(Algorithm::HS256);
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            allow_bare_token,
        }
    }

    /// Validates a credential as it appears in the `Authorization` header.
    ///
    /// Accepts `Bearer <token>`; a bare token only when the compatibility
    /// flag is set. Expired, tampered, and undecodable tokens map to
    /// distinct errors so the caller can produce distinct messages.
    pub fn validate(&self, credential: &str) -> Result<Claims, AuthError> {
        let token = self.strip_scheme(credential)?;
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => Err(match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    AuthError::SignatureInvalid
                }
                _ => AuthError::Malformed,
            }),
        }
    }

    fn strip_scheme<'a>(&self, credential: &'a str) -> Result<&'a str, AuthError> {
        let parts: Vec<&str> = credential.split(' ').collect();
        match parts.as_slice() {
            ["Bearer", token] => Ok(token),
            [token] if self.allow_bare_token => Ok(token),
            _ => Err(AuthError::Malformed),
        }
    }
}

/// Role gate for protected operations.
pub fn authorize(claims: &Claims, allowed: &[Role]) -> Result<(), AuthError> {
    match claims.role {
        Some(role) if allowed.contains(&role) => Ok(()),
        _ => Err(AuthError::Forbidden),
    }
}

/// Authentication layer for protected routes. On success the decoded
/// [`Claims`] are attached to the request for handlers to consume.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, ServerError> {
    let credential = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingCredential)?;

    let claims = state.validator.validate(credential).map_err(|e| {
        warn!(path = %req.uri().path(), error = %e, "credential rejected");
        e
    })?;

    // A token that decodes but names no subject is not usable identity.
    if claims.user_id.is_none() {
        return Err(AuthError::Unauthorized.into());
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
