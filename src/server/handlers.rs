use super::{error::ApiError, AppState};
use crate::services::PNG_MEDIA_TYPE;
use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::{io::Cursor, sync::Arc};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

pub const HEALTH_MESSAGE: &str = "Background Removal API is running.";

/// Name of the multipart part carrying the upload
pub const FILE_FIELD: &str = "file";

pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "message": HEALTH_MESSAGE }))
}

pub async fn remove_background(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        debug!(error = %rejection, "Request body is not multipart");
        ApiError::MalformedBody
    })?;

    let field = loop {
        let next = multipart.next_field().await.map_err(|e| {
            debug!(error = %e, "Failed to read multipart field");
            ApiError::MalformedBody
        })?;
        match next {
            Some(field) if field.name() == Some(FILE_FIELD) => break field,
            Some(_) => continue,
            None => return Err(ApiError::MissingFile),
        }
    };

    let content_type = field.content_type().map(str::to_owned);
    if !content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("image/"))
    {
        return Err(ApiError::NotAnImage);
    }
    let file_name = field.file_name().unwrap_or_default().to_owned();

    let image_bytes = field
        .bytes()
        .await
        .map_err(|e| ApiError::Processing(e.to_string()))?;

    info!(
        file_name = %file_name,
        content_type = content_type.as_deref().unwrap_or_default(),
        size = image_bytes.len(),
        "Removing background"
    );

    let remover = Arc::clone(&state.remover);
    let png = tokio::task::spawn_blocking(move || remover.remove(&image_bytes))
        .await
        .map_err(|e| ApiError::Processing(e.to_string()))??;

    debug!(output_bytes = png.len(), "Streaming PNG response");

    let body = Body::from_stream(ReaderStream::new(Cursor::new(png)));
    Ok(([(header::CONTENT_TYPE, PNG_MEDIA_TYPE)], body).into_response())
}
