//! Operator routes mounted under `/adminapi`.
//!
//! Every outcome, including a panic in the commit task, is answered with
//! `{"success": bool, "message": "..."}`: 200 on success, 400 otherwise.

use std::sync::Arc;

use address_data::SUCCESS_MESSAGE;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Query, State,
        multipart::{Field, MultipartRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use super::AppState;

/// Multipart field carrying the replacement database.
const UPLOAD_FIELD: &str = "dbFile";

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/database/upload",
            post(upload)
                .fallback(upload_wrong_method)
                .layer(DefaultBodyLimit::disable()),
        )
        .route("/hello", get(hello))
}

#[derive(Debug, Serialize)]
struct AdminResponse {
    success: bool,
    message: String,
}

fn reply(success: bool, text: impl Into<String>) -> Response {
    let message = text.into();
    let status = if success {
        StatusCode::OK
    } else {
        warn!("admin request failed: {message}");
        StatusCode::BAD_REQUEST
    };
    (
        status,
        [(header::CACHE_CONTROL, "no-cache")],
        Json(AdminResponse { success, message }),
    )
        .into_response()
}

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    match receive_upload(&state, multipart).await {
        Ok(()) => reply(true, SUCCESS_MESSAGE),
        Err(message) => reply(false, message),
    }
}

async fn upload_wrong_method() -> Response {
    reply(false, "Invalid request method. Only POST is allowed.")
}

async fn receive_upload(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(), String> {
    let mut form = multipart.map_err(|rejection| {
        format!("Invalid Content-Type. Expected multipart/form-data ({rejection})")
    })?;
    while let Some(field) = form
        .next_field()
        .await
        .map_err(|err| format!("Failed to parse form: {err}"))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            return replace_from_field(state, field).await;
        }
    }
    Err(format!(
        "Failed to get the uploaded file: no {UPLOAD_FIELD} field in form"
    ))
}

async fn replace_from_field(state: &AppState, mut field: Field<'_>) -> Result<(), String> {
    let file_name = field.file_name().unwrap_or_default().to_owned();
    let manager = Arc::clone(state.manager());
    let permit = manager
        .begin_upload(&file_name)
        .map_err(|err| err.to_string())?;
    let staged = manager
        .create_staging_file(&permit)
        .map_err(|err| err.to_string())?;

    let mut file = tokio::fs::File::from_std(staged);
    if let Err(message) = stream_to_file(&mut field, &mut file).await {
        drop(file);
        manager.discard_staged(&permit);
        return Err(message);
    }
    drop(file);
    info!("upload {file_name:?} staged");

    tokio::task::spawn_blocking(move || manager.commit_staged(&permit))
        .await
        .map_err(|err| format!("Internal server error: {err}"))?
        .map_err(|err| err.to_string())
}

async fn stream_to_file(field: &mut Field<'_>, file: &mut tokio::fs::File) -> Result<(), String> {
    let failed = |err: &dyn std::fmt::Display| format!("Failed to write file: {err}");
    while let Some(chunk) = field.chunk().await.map_err(|err| failed(&err))? {
        file.write_all(&chunk).await.map_err(|err| failed(&err))?;
    }
    file.flush().await.map_err(|err| failed(&err))?;
    file.sync_all().await.map_err(|err| failed(&err))
}

#[derive(Debug, Deserialize)]
struct HelloParams {
    #[serde(default)]
    name: String,
}

async fn hello(Query(params): Query<HelloParams>) -> Response {
    if params.name.is_empty() {
        return reply(false, "Missing name parameter");
    }
    format!("ping {}\n", params.name).into_response()
}
