use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use imagehost_service::{ErrorCategory, ImageError};
use serde_json::json;

/// API错误响应
/// 响应体格式：{"error": "<message>"}
#[derive(Debug)]
pub struct ApiError(pub ImageError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ImageError::Captcha(_) | ImageError::InvalidIdentifier => StatusCode::FORBIDDEN,
            ImageError::NotFound => StatusCode::NOT_FOUND,
            err if err.category() == ErrorCategory::Storage => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self.0.category() {
            ErrorCategory::Storage => {
                tracing::error!(status = status.as_u16(), detail = %self.0.detail(), "{}", self.0)
            }
            ErrorCategory::Gate | ErrorCategory::ClientInput => {
                tracing::debug!(status = status.as_u16(), detail = %self.0.detail(), "{}", self.0)
            }
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ImageError::UnsupportedContentType, StatusCode::BAD_REQUEST),
            (ImageError::PayloadTooLarge { max_mb: 1 }, StatusCode::BAD_REQUEST),
            (ImageError::InvalidEncoding, StatusCode::BAD_REQUEST),
            (ImageError::EmptyPayload, StatusCode::BAD_REQUEST),
            (
                ImageError::DisallowedMediaType {
                    media_type: "text/plain".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (ImageError::InvalidIdentifier, StatusCode::FORBIDDEN),
            (ImageError::NotFound, StatusCode::NOT_FOUND),
            (
                ImageError::IoFailure {
                    detail: "reset".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ImageError::StorageFailure(anyhow::anyhow!("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ImageError::DetectionFailed(std::io::Error::from(std::io::ErrorKind::NotFound)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ImageError::DeleteFailed(anyhow::anyhow!("permission denied")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }
}
