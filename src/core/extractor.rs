use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::{de::DeserializeOwned, Deserialize};

use crate::core::error::AppError;
use crate::features::auth::Requester;

/// JSON body that may be absent.
///
/// An empty body yields `T::default()`, so required fields surface as
/// validation errors of the DTO instead of a parse failure.
pub struct JsonOrDefault<T>(pub T);

impl<T, S> FromRequest<S> for JsonOrDefault<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read request body: {}", e)))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        serde_json::from_slice(&body)
            .map(Self)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON data: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequesterParams {
    role: Option<String>,
    user_id: Option<String>,
}

/// Caller identity taken from the `role` and `userId` query parameters.
///
/// `None` when no role was sent; role-checked paths only apply when it is
/// `Some`.
pub struct MaybeRequester(pub Option<Requester>);

impl<S> FromRequestParts<S> for MaybeRequester
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<RequesterParams>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid query parameters: {}", e)))?;

        let requester = params
            .role
            .as_deref()
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .map(|role| Requester::from_raw(role, params.user_id.as_deref()));

        Ok(Self(requester))
    }
}
