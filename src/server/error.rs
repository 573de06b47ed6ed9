use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("File provided is not an image.")]
    NotAnImage,

    #[error("There was an error parsing the body")]
    MalformedBody,

    #[error("Field required")]
    MissingFile,

    #[error("Error processing image: {0}")]
    Processing(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotAnImage | ApiError::MalformedBody => StatusCode::BAD_REQUEST,
            ApiError::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<crate::error::BgRemovalError> for ApiError {
    fn from(err: crate::error::BgRemovalError) -> Self {
        ApiError::Processing(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            detail: serde_json::Value,
        }

        let status = self.status_code();
        let detail = match &self {
            ApiError::MissingFile => json!([{
                "type": "missing",
                "loc": ["body", "file"],
                "msg": self.to_string(),
                "input": null,
            }]),
            _ => json!(self.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(ErrorResponse { detail })).into_response()
    }
}
