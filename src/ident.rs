//! Caller identity for the HTTP routes.
//!
//! Authentication lives in the external identity service; requests arrive
//! with the already-authenticated user id in the `x-user-id` header.

use axum::extract::FromRequestParts;
use axum::http::{StatusCode, request::Parts};

pub const USER_ID_HEADER: &str = "x-user-id";

pub struct CallerId(pub String);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|value| CallerId(value.to_owned()))
            .ok_or((StatusCode::UNAUTHORIZED, "missing x-user-id header"))
    }
}
