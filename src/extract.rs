//! Extractors that report malformed input as `ApiError::Validation` (422)
//! instead of axum's plain-text rejections.

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, FieldError};

/// JSON request body
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => {
                tracing::debug!("Rejected request body: {}", rejection.body_text());
                Err(ApiError::Validation(vec![describe(&rejection.body_text())]))
            }
        }
    }
}

/// Query string parameters
#[derive(Debug)]
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ValidQuery(value)),
            Err(rejection) => Err(ApiError::Validation(vec![describe(&rejection.body_text())])),
        }
    }
}

/// Integer id taken from the `{id}` path segment
#[derive(Debug, Clone, Copy)]
pub struct ValidId(pub i64);

impl<S> FromRequestParts<S> for ValidId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<i64> = Path::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::invalid_field("id", rejection.body_text()))?;

        Ok(Self(id))
    }
}

/// Turn an axum deserialization message into a field error.
///
/// Messages look like `Failed to deserialize ...: secret_name: invalid type: ...`
/// or `...: missing field `secret_name` at line 1 column 24`.
fn describe(text: &str) -> FieldError {
    let detail = text.split_once(": ").map_or(text, |(_, rest)| rest);

    if let Some(field) = missing_field(detail) {
        return FieldError::new(field, "field required");
    }

    match detail.split_once(": ") {
        Some((path, message)) if is_field_path(path) => FieldError::new(path, message),
        _ => FieldError::request(detail),
    }
}

fn missing_field(detail: &str) -> Option<&str> {
    let rest = detail.strip_prefix("missing field `")?;
    rest.split_once('`').map(|(field, _)| field)
}

fn is_field_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'))
}
