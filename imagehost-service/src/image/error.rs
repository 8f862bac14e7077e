use imagehost_infra::VerificationError;
use thiserror::Error;

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 客户端输入错误，消息可以直接返回给客户端
    ClientInput,
    /// 人机验证失败，只返回通用消息
    Gate,
    /// 存储或内部错误，只返回通用消息
    Storage,
}

/// 图片服务错误
/// Display只包含可以返回给客户端的消息，详细原因通过source或detail获取
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Unsupported content type")]
    UnsupportedContentType,

    #[error("Invalid request body")]
    InvalidRequestBody,

    #[error("No file provided")]
    MissingFile,

    #[error("No base64 data provided")]
    MissingBase64,

    #[error("CAPTCHA verification failed")]
    Captcha(#[source] VerificationError),

    #[error("File too large (max {max_mb}MB)")]
    PayloadTooLarge { max_mb: u64 },

    #[error("Invalid base64 data")]
    InvalidEncoding,

    #[error("Failed to read file data")]
    IoFailure { detail: String },

    #[error("No file data received")]
    EmptyPayload,

    #[error("Only image files are allowed")]
    DisallowedMediaType { media_type: String },

    #[error("Failed to save file")]
    StorageFailure(anyhow::Error),

    #[error("Invalid file path")]
    InvalidIdentifier,

    #[error("Image not found")]
    NotFound,

    #[error("Failed to detect file type")]
    DetectionFailed(#[source] std::io::Error),

    #[error("Failed to read image metadata")]
    StatFailed(anyhow::Error),

    #[error("Failed to delete image")]
    DeleteFailed(anyhow::Error),

    #[error("Failed to read upload directory")]
    ListFailed(anyhow::Error),
}

impl ImageError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ImageError::Captcha(_) => ErrorCategory::Gate,
            ImageError::IoFailure { .. }
            | ImageError::StorageFailure(_)
            | ImageError::DetectionFailed(_)
            | ImageError::StatFailed(_)
            | ImageError::DeleteFailed(_)
            | ImageError::ListFailed(_) => ErrorCategory::Storage,
            _ => ErrorCategory::ClientInput,
        }
    }

    /// 用于日志的详细原因
    pub fn detail(&self) -> String {
        match self {
            ImageError::Captcha(e) => e.to_string(),
            ImageError::IoFailure { detail } => detail.clone(),
            ImageError::DisallowedMediaType { media_type } => format!("detected {}", media_type),
            ImageError::DetectionFailed(e) => e.to_string(),
            ImageError::StorageFailure(e)
            | ImageError::StatFailed(e)
            | ImageError::DeleteFailed(e)
            | ImageError::ListFailed(e) => format!("{:#}", e),
            other => other.to_string(),
        }
    }
}
