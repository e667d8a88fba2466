//! HTTP surface of the service.
//!
//! Query routes live under `/api`, operator routes under `/adminapi`. Store
//! calls block, so every handler hands them to Tokio's blocking pool.

use std::sync::Arc;

use address_core::{QueryError, ValidationError};
use address_data::StoreManager;
use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::warn;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinError;

mod admin;
mod api;

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    manager: Arc<StoreManager>,
}

impl AppState {
    /// Wrap the lifecycle manager for use in handlers.
    #[must_use]
    pub const fn new(manager: Arc<StoreManager>) -> Self {
        Self { manager }
    }

    /// The lifecycle manager behind the handlers.
    #[must_use]
    pub const fn manager(&self) -> &Arc<StoreManager> {
        &self.manager
    }
}

/// Build the service router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api::routes())
        .nest("/adminapi", admin::routes())
        .with_state(state)
}

/// Failure of a query route, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("missing query parameter {0}")]
    MissingParameter(&'static str),
    #[error("address {0} not found")]
    NotFound(i64),
    #[error("query task failed: {0}")]
    Task(#[from] JoinError),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Query(QueryError::from(err))
    }
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Query(QueryError::InvalidArgument(_)) | Self::MissingParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Query(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("request failed: {self}");
        }
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

/// Run a store call on the blocking pool.
pub(crate) async fn run_blocking<T, F>(state: &AppState, query: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&StoreManager) -> Result<T, QueryError> + Send + 'static,
{
    let manager = Arc::clone(&state.manager);
    let outcome = tokio::task::spawn_blocking(move || query(&manager)).await?;
    Ok(outcome?)
}
