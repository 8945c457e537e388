//! Request extractors.
//!
//! Authentication is handled upstream; the gateway forwards the caller as
//! `X-Actor-Id` and `X-Actor-Role` headers.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use spacehub_types::{Actor, Role, UserId};

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .ok_or_else(|| ApiError::InvalidActor(format!("{name} header is required")))
        };

        let user_id = UserId::parse(header(ACTOR_ID_HEADER)?)
            .map_err(|e| ApiError::InvalidActor(format!("{ACTOR_ID_HEADER}: {e}")))?;
        let role: Role = header(ACTOR_ROLE_HEADER)?
            .to_ascii_lowercase()
            .parse()
            .map_err(ApiError::InvalidActor)?;

        Ok(CurrentActor(Actor::new(user_id, role)))
    }
}

/// JSON body whose rejections use the API error format.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::InvalidRequestBody(e.body_text()))?;
        Ok(ApiJson(value))
    }
}

/// Parse a path id, accepting the prefixed display form (`bk_...`) too.
pub fn parse_id<T>(raw: &str, parse: fn(&str) -> Result<T, uuid::Error>) -> Result<T, ApiError> {
    parse(raw).map_err(|e| ApiError::InvalidParameter(format!("'{raw}' is not a valid id: {e}")))
}
