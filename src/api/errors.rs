use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::services::ai_gateway::GatewayError;
use crate::services::grading_pipeline::GradingError;
use crate::services::intake::IntakeError;
use crate::services::similar_problems::SimilarProblemsError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<Value>,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    Validation { detail: String, context: Value },
    NotFound(String),
    TooManyRequests(&'static str),
    ServiceUnavailable(String),
    Internal { detail: String, context: Option<Value> },
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal { detail: context.to_string(), context: None }
    }

    fn parts(self) -> (StatusCode, String, Option<Value>) {
        match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail, None),
            ApiError::Validation { detail, context } => {
                (StatusCode::BAD_REQUEST, detail, Some(context))
            }
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail, None),
            ApiError::TooManyRequests(detail) => {
                (StatusCode::TOO_MANY_REQUESTS, detail.to_string(), None)
            }
            ApiError::ServiceUnavailable(detail) => {
                tracing::warn!(error = %detail, "Service unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, detail, None)
            }
            ApiError::Internal { detail, context } => {
                tracing::error!(error = %detail, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, detail, context)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail, context) = self.parts();
        (status, Json(ErrorResponse { status: status.as_u16(), detail, context })).into_response()
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        let context = match &err {
            IntakeError::MissingStudentId => json!({ "field": "studentId" }),
            IntakeError::NoImages => json!({ "field": "images" }),
            IntakeError::TooManyImages { count, max } => {
                json!({ "field": "images", "imageCount": count, "maxImages": max })
            }
            IntakeError::InvalidEncoding { index } => json!({ "imageIndex": index }),
            IntakeError::ImageTooLarge { index, size_bytes, max_bytes } => {
                json!({ "imageIndex": index, "imageSize": size_bytes, "maxImageSize": max_bytes })
            }
        };
        ApiError::Validation { detail: err.to_string(), context }
    }
}

impl From<GradingError> for ApiError {
    fn from(err: GradingError) -> Self {
        match err {
            GradingError::Validation(err) => err.into(),
            GradingError::StudentNotFound(student_id) => {
                ApiError::NotFound(format!("Student {student_id} not found"))
            }
            GradingError::Persistence { student_id, image_count, source } => {
                tracing::error!(
                    student_id = %student_id,
                    image_count,
                    error = %source,
                    "Failed to store homework grading"
                );
                ApiError::Internal {
                    detail: "Failed to store homework grading".to_string(),
                    context: Some(json!({ "studentId": student_id, "imageCount": image_count })),
                }
            }
            GradingError::Cancelled => {
                ApiError::ServiceUnavailable("Grading was interrupted by shutdown".to_string())
            }
        }
    }
}

impl From<SimilarProblemsError> for ApiError {
    fn from(err: SimilarProblemsError) -> Self {
        match err {
            SimilarProblemsError::NoWeaknesses => {
                ApiError::BadRequest("No weakness types to practice".to_string())
            }
            SimilarProblemsError::Gateway(GatewayError::Cancelled) => {
                ApiError::ServiceUnavailable("Problem generation was interrupted by shutdown".to_string())
            }
            SimilarProblemsError::Gateway(err) => {
                tracing::warn!(error = %err, "Similar problem generation failed");
                ApiError::ServiceUnavailable("AI service could not generate problems".to_string())
            }
            SimilarProblemsError::Unusable(_) => {
                ApiError::ServiceUnavailable("AI service returned no usable problems".to_string())
            }
        }
    }
}
