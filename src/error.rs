use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::ocr::OcrError;

/// Request-path failures. Each variant carries the diagnostic payload its
/// JSON response must expose to the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("OCR confidence {confidence:.1} below acceptance threshold")]
    LowConfidence { confidence: f64, ocr_text: String },

    #[error("OCR service failure: {0}")]
    OcrService(#[from] OcrError),

    #[error("no student matched the scanned card")]
    StudentNotFound {
        student_code: Option<String>,
        student_name: Option<String>,
        confidence: f64,
        ocr_text: String,
    },

    #[error("storage failure: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error("invalid student: {0}")]
    InvalidStudent(String),

    #[error("student code {0} is already registered")]
    DuplicateStudent(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::LowConfidence {
                confidence,
                ocr_text,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "success": false,
                    "error": "low_confidence",
                    "confidence": confidence,
                    "ocrText": ocr_text,
                }),
            ),
            ApiError::StudentNotFound {
                student_code,
                student_name,
                confidence,
                ocr_text,
            } => (
                StatusCode::NOT_FOUND,
                json!({
                    "success": false,
                    "error": "student_not_found",
                    "studentId": student_code,
                    "studentName": student_name,
                    "confidence": confidence,
                    "ocrText": ocr_text,
                }),
            ),
            ApiError::OcrService(ref e) => {
                tracing::error!(error = %e, "OCR collaborator failed");
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "success": false, "error": self.to_string() }),
                )
            }
            ApiError::Persistence(ref e) => {
                tracing::error!(error = %e, "database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": "storage failure" }),
                )
            }
            ApiError::InvalidUpload(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": message }),
            ),
            ApiError::InvalidStudent(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": message }),
            ),
            ApiError::DuplicateStudent(code) => (
                StatusCode::CONFLICT,
                json!({
                    "success": false,
                    "error": format!("student code {code} is already registered"),
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_confidence_maps_to_unprocessable() {
        let response = ApiError::LowConfidence {
            confidence: 40.0,
            ocr_text: "blurry".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = ApiError::StudentNotFound {
            student_code: Some("B21DCVT020".to_string()),
            student_name: None,
            confidence: 80.0,
            ocr_text: String::new(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn ocr_failure_maps_to_bad_gateway() {
        let response = ApiError::OcrService(OcrError::Api(500, "boom".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
