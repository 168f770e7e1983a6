/*!
 * # Authentication and Authorization Module
 *
 * Bearer tokens are HS256 JWTs carrying the caller's store (tenant) and user
 * type. The signing key is injected from [`crate::config::AppConfig`] at
 * startup.
 *
 * Layering:
 *
 * - [`auth_middleware`] verifies the token and stores an [`AuthUser`] in the
 *   request extensions.
 * - [`user_type_middleware`] restricts a router to one user type, e.g.
 *   `shop_owner` for the back-office.
 * - Handlers compare the requested store with [`AuthUser::authorize_store`].
 */

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{config::AppConfig, errors::ServiceError};

/// User type allowed to operate the store back-office.
pub const SHOP_OWNER: &str = "shop_owner";

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Tenant the token was issued for. Customers of the storefront may not have one.
    #[serde(default)]
    pub store_id: Option<i32>,
    pub user_type: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller extracted from the JWT token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Option<i64>,
    pub store_id: Option<i32>,
    pub user_type: String,
}

impl AuthUser {
    /// Rejects access to any store other than the one the token was issued for.
    pub fn authorize_store(&self, store_id: i32) -> Result<(), ServiceError> {
        if self.store_id == Some(store_id) {
            Ok(())
        } else {
            warn!(
                requested_store = store_id,
                token_store = ?self.store_id,
                "cross-tenant access rejected"
            );
            Err(ServiceError::Forbidden(
                "Access denied for this store".to_string(),
            ))
        }
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            store_id: claims.store_id,
            user_type: claims.user_type,
        }
    }
}

/// Authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, token_ttl: Duration) -> Self {
        Self {
            jwt_secret,
            token_ttl,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

/// Issues and verifies bearer tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Signs a token for the given caller. Token issuance over HTTP belongs to
    /// the account service; this is used by tooling and tests.
    pub fn issue_token(
        &self,
        user_id: Option<i64>,
        store_id: Option<i32>,
        user_type: &str,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id,
            store_id,
            user_type: user_type.to_string(),
            iat: now,
            exp: now + self.config.token_ttl.as_secs() as i64,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => {
                debug!(error = %e, "token rejected");
                AuthError::InvalidToken
            }
        })
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token missing")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Access denied")]
    InsufficientPermissions,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // A present but unusable token is answered with 403, an absent one with 401.
        let (status, error_code) = match &self {
            Self::MissingToken => (StatusCode::UNAUTHORIZED, "TOKEN_MISSING"),
            Self::InvalidToken => (StatusCode::FORBIDDEN, "INVALID_TOKEN"),
            Self::TokenExpired => (StatusCode::FORBIDDEN, "TOKEN_EXPIRED"),
            Self::InsufficientPermissions => (StatusCode::FORBIDDEN, "ACCESS_DENIED"),
            Self::TokenCreation(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "TOKEN_CREATION_FAILED")
            }
            Self::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "AUTH_INTERNAL_ERROR"),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware that extracts and validates auth tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, AuthError> {
    let auth_service = request
        .extensions()
        .get::<Arc<AuthService>>()
        .cloned()
        .ok_or_else(|| AuthError::InternalError("Authentication service not available".into()))?;

    let token = bearer_token(request.headers()).ok_or(AuthError::MissingToken)?;
    let claims = auth_service.validate_token(token)?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

/// Restricts a route to callers of a single user type.
pub async fn user_type_middleware(
    State(required_type): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingToken)?;

    if user.user_type != required_type {
        warn!(user_type = %user.user_type, required = %required_type, "user type rejected");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_user_type(self, user_type: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_user_type(self, user_type: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            user_type.to_string(),
            user_type_middleware,
        ))
        .with_auth()
    }
}
