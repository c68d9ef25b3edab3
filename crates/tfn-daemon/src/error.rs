//! HTTP mapping of [`TiffinError`].

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tfn_schemas::TiffinError;
use tracing::error;

use crate::api_types::ErrorBody;

#[derive(Debug)]
pub struct ApiError(pub TiffinError);

impl From<TiffinError> for ApiError {
    fn from(e: TiffinError) -> Self {
        ApiError(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError(TiffinError::validation("body", r.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        ApiError(TiffinError::validation("query", r.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        ApiError(TiffinError::validation("path", r.body_text()))
    }
}

pub fn status_for(e: &TiffinError) -> StatusCode {
    match e {
        TiffinError::Validation { .. } => StatusCode::BAD_REQUEST,
        TiffinError::Conflict { .. } => StatusCode::CONFLICT,
        TiffinError::NotFound(_) => StatusCode::NOT_FOUND,
        TiffinError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        TiffinError::Forbidden(_) => StatusCode::FORBIDDEN,
        TiffinError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let code = self.0.code().to_string();
        let body = match self.0 {
            TiffinError::Validation { message, errors } => ErrorBody {
                success: false,
                error: code,
                message,
                errors: Some(errors),
                duplicates: None,
            },
            TiffinError::Conflict {
                message,
                duplicates,
            } => ErrorBody {
                success: false,
                error: code,
                message,
                errors: None,
                duplicates: (!duplicates.is_empty()).then_some(duplicates),
            },
            TiffinError::Internal(e) => {
                error!(error = ?e, "api/internal_error");
                ErrorBody {
                    success: false,
                    error: code,
                    message: "Internal server error".to_string(),
                    errors: None,
                    duplicates: None,
                }
            }
            TiffinError::NotFound(message)
            | TiffinError::Unauthorized(message)
            | TiffinError::Forbidden(message) => ErrorBody {
                success: false,
                error: code,
                message,
                errors: None,
                duplicates: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
