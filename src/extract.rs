use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;

/// JSON body extractor whose rejections render as `{ "message": ... }`.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!(error = %rejection, "rejected request body");
                Err(AppError::InvalidJson(rejection_detail(&rejection)))
            }
        }
    }
}

fn rejection_detail(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "expected `Content-Type: application/json`".to_string()
        }
        other => other.body_text(),
    }
}

pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|err| AppError::InvalidId(err.to_string()))
}

/// The `:trip_id` segment of the matched route.
#[derive(Debug, Clone, Copy)]
pub struct TripId(pub Uuid);

/// The `:participant_id` segment of the matched route.
#[derive(Debug, Clone, Copy)]
pub struct ParticipantId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for TripId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        path_id(parts, state).await.map(Self)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ParticipantId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        path_id(parts, state).await.map(Self)
    }
}

// Percent-decoding failures surface here, before any handler code runs.
async fn path_id<S>(parts: &mut Parts, state: &S) -> Result<Uuid, AppError>
where
    S: Send + Sync,
{
    match Path::<String>::from_request_parts(parts, state).await {
        Ok(Path(raw)) => parse_id(&raw),
        Err(rejection) => {
            debug!(error = %rejection, "rejected path segment");
            Err(AppError::InvalidId(rejection.body_text()))
        }
    }
}
