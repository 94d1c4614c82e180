//! Route error type and its HTTP mapping.
//!
//! Dashboard clients read failures from the `errors` array of a 200 response,
//! so validation and not-found outcomes are not HTTP errors. Only a missing
//! session (401) and unexpected failures (500) change the status code.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::services::auth::AuthError;
use crate::services::components::ComponentError;
use crate::services::dashboard::DashboardError;
use crate::services::metric::MetricError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("{0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(errors) => Json(serde_json::json!({ "errors": errors })).into_response(),
            Self::NotFound(message) => Json(serde_json::json!({ "errors": [message] })).into_response(),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            Self::Internal(message) => {
                error!(error = %message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(status = %rejection.status(), "json body rejected");
        Self::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        debug!(status = %rejection.status(), "query string rejected");
        Self::validation(rejection.body_text())
    }
}

// =============================================================================
// EXTRACTORS
// =============================================================================

/// `Json` whose rejection is reported in the `errors` array.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Query` whose rejection is reported in the `errors` array.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::NotFound(_) => Self::NotFound(err.to_string()),
            DashboardError::Database(_) | DashboardError::Ordering(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<ComponentError> for ApiError {
    fn from(err: ComponentError) -> Self {
        match err {
            ComponentError::DashboardNotFound(_) | ComponentError::GraphNotFound(_) | ComponentError::ControlNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            ComponentError::Database(_) | ComponentError::Ordering(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<MetricError> for ApiError {
    fn from(err: MetricError) -> Self {
        match err {
            MetricError::InvalidGroupBy(_) | MetricError::InvalidRange => Self::validation(err.to_string()),
            MetricError::Database(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
