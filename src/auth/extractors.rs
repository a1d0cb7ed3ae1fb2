use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::warn;

use super::claims::{Identity, Role};
use super::jwt::{JwtKeys, TokenError};
use crate::error::ApiError;

/// Reads `Authorization: Bearer <token>`. A missing header, another scheme
/// and an empty token are all the same failure.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, TokenError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(TokenError::Missing)?;
    let (scheme, token) = value.split_once(' ').ok_or(TokenError::Missing)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(TokenError::Missing);
    }
    Ok(token)
}

/// Verifies the bearer token and injects the caller's [`Identity`].
/// Nothing downstream runs when verification fails.
pub async fn authenticate(
    State(keys): State<JwtKeys>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = {
        let token = bearer_token(request.headers())?;
        keys.verify(token)?
    };
    request.extensions_mut().insert(claims.identity());
    Ok(next.run(request).await)
}

/// Rejects identities of any role other than the one in state. Must sit
/// inside [`authenticate`].
pub async fn require_role(
    State(required): State<Role>,
    identity: Identity,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if identity.role != required {
        warn!(account_id = %identity.subject_id, role = %identity.role, %required, "role not allowed");
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .copied()
            .ok_or(ApiError::Unauthorized(TokenError::Missing))
    }
}

/// Normalizes and checks a request body after it has been parsed.
pub trait Validate {
    fn validate(&mut self) -> Result<(), ApiError>;
}

/// JSON body extractor whose rejections are JSON too.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(mut value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}
