//! Bearer-token authentication
//!
//! Access tokens are HS256 JWTs carrying the user id. The middleware resolves
//! the Authorization header to a stored user and injects it as a request
//! extension; handlers behind it can rely on the user existing.

use aigen_common::{Error, Result};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::handlers::{ApiError, AppState};
use crate::users;

const TOKEN_LIFETIME_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

pub fn issue_token(secret: &str, user_id: &str) -> Result<String> {
    let now = Utc::now().timestamp() as u64;
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Auth(format!("failed to issue token: {e}")))
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            Error::Auth("access token expired".to_string())
        }
        _ => Error::Auth("invalid access token".to_string()),
    })
}

/// Require a valid bearer token resolving to a stored user
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| Error::Auth("missing access token".to_string()))?;

    let claims = verify_token(&state.config.jwt_secret, token)?;

    let user = users::find_by_id(state.store.as_ref(), &claims.sub)
        .await?
        .ok_or_else(|| Error::Auth("user not found, please log in first".to_string()))?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let token = issue_token("secret", "user-1").unwrap();
        let claims = verify_token("secret", &token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = issue_token("secret", "user-1").unwrap();
        let err = verify_token("other-secret", &token).unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let err = verify_token("secret", "not-a-token").unwrap_err();
        assert_eq!(err.to_string(), "Authentication failed: invalid access token");
    }
}
