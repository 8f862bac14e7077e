pub mod cache;
pub mod error;
pub mod settings;
pub mod upload;


pub use cache::{CacheHeaders, ConditionalHeaders, ServeOutcome};
pub use error::{ErrorCategory, ImageError};
pub use settings::ImageSettings;
pub use upload::{
    FileContent, JsonPayload, MultipartFile, UploadBody, UploadRequest, DEFAULT_EXTENSION,
};

use async_trait::async_trait;
use chrono::Utc;
use imagehost_domain::{ImageId, ImageResponse, StoredImage};
use imagehost_infra::{mime, CaptchaVerifier, ImageStorage};
use std::sync::Arc;
use tracing::{info, warn};

/// 图片服务trait
#[async_trait]
pub trait ImageService: Send + Sync {
    /// 上传图片
    async fn upload(&self, request: UploadRequest) -> Result<ImageResponse, ImageError>;

    /// 获取图片，支持条件请求
    async fn serve(
        &self,
        id: &str,
        conditions: &ConditionalHeaders,
    ) -> Result<ServeOutcome, ImageError>;

    /// 列出图片，最新上传的在前
    async fn list(&self) -> Result<Vec<ImageResponse>, ImageError>;

    /// 删除图片
    async fn delete(&self, id: &str) -> Result<(), ImageError>;

    /// 服务配置
    fn settings(&self) -> &ImageSettings;
}

/// 默认图片服务实现
pub struct DefaultImageService {
    storage: Arc<dyn ImageStorage>,
    captcha_verifier: Arc<dyn CaptchaVerifier>,
    settings: Arc<ImageSettings>,
}

impl DefaultImageService {
    pub fn new(
        storage: Arc<dyn ImageStorage>,
        captcha_verifier: Arc<dyn CaptchaVerifier>,
        settings: Arc<ImageSettings>,
    ) -> Self {
        Self {
            storage,
            captcha_verifier,
            settings,
        }
    }

    /// 人机验证
    async fn check_captcha(
        &self,
        token: Option<&str>,
        remote_ip: Option<&str>,
    ) -> Result<(), ImageError> {
        let client_ip = remote_ip.unwrap_or("unknown");
        match self
            .captcha_verifier
            .verify(&self.settings.captcha_secret, token.unwrap_or(""), remote_ip)
            .await
        {
            Ok(()) => {
                info!(client_ip, "Turnstile verification successful");
                Ok(())
            }
            Err(e) => {
                warn!(client_ip, error = %e, "Turnstile verification failed");
                Err(ImageError::Captcha(e))
            }
        }
    }

    fn parse_id(raw: &str) -> Result<ImageId, ImageError> {
        ImageId::parse(raw).ok_or(ImageError::InvalidIdentifier)
    }
}

#[async_trait]
impl ImageService for DefaultImageService {
    async fn upload(&self, request: UploadRequest) -> Result<ImageResponse, ImageError> {
        let uploaded_at = Utc::now();
        let UploadRequest {
            body,
            captcha_token,
            remote_ip,
        } = request;

        // 1. 人机验证
        self.check_captcha(captcha_token.as_deref(), remote_ip.as_deref())
            .await?;

        // 2. 解码并检查大小
        let decoded = body.decode(
            self.settings.max_upload_size,
            self.settings.max_upload_size_mb(),
        )?;
        if decoded.content.is_empty() {
            return Err(ImageError::EmptyPayload);
        }

        // 3. 按内容识别类型
        let media_type = mime::detect(&decoded.content);
        if !media_type.starts_with(&self.settings.allowed_mime_prefix) {
            return Err(ImageError::DisallowedMediaType {
                media_type: media_type.to_string(),
            });
        }

        // 4. 扩展名：客户端声明 > 识别结果 > 默认
        let extension = decoded
            .declared_extension
            .as_deref()
            .or_else(|| mime::extension_for(media_type))
            .unwrap_or(DEFAULT_EXTENSION);

        // 5. 保存
        let id = ImageId::generate(extension);
        if let Err(e) = self.storage.save(&id, &decoded.content).await {
            tracing::error!(id = %id, error = %format!("{:#}", e), "Failed to save file");
            return Err(ImageError::StorageFailure(e));
        }

        let size = decoded.content.len() as u64;
        info!(id = %id, size, media_type, "Image uploaded");
        Ok(StoredImage::new(id, size, uploaded_at).into_response(&self.settings.server_url))
    }

    async fn serve(
        &self,
        id: &str,
        conditions: &ConditionalHeaders,
    ) -> Result<ServeOutcome, ImageError> {
        let id = Self::parse_id(id)?;

        let stat = self
            .storage
            .stat(&id)
            .await
            .map_err(ImageError::StatFailed)?
            .ok_or(ImageError::NotFound)?;

        let cache = CacheHeaders::from_stat(&stat, self.settings.cache_control());
        if cache.is_not_modified(conditions) {
            return Ok(ServeOutcome::NotModified { cache });
        }

        let path = self.storage.path_of(&id);
        let media_type = mime::detect_from_path(&path)
            .await
            .map_err(ImageError::DetectionFailed)?;

        Ok(ServeOutcome::File {
            path,
            media_type,
            size: stat.size,
            cache,
        })
    }

    async fn list(&self) -> Result<Vec<ImageResponse>, ImageError> {
        let images = self.storage.list().await.map_err(ImageError::ListFailed)?;
        Ok(images
            .into_iter()
            .map(|image| image.into_response(&self.settings.server_url))
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<(), ImageError> {
        let id = Self::parse_id(id)?;

        match self.storage.stat(&id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(ImageError::NotFound),
            Err(e) => return Err(ImageError::StatFailed(e)),
        }

        self.storage.delete(&id).await.map_err(|e| {
            tracing::error!(id = %id, error = %format!("{:#}", e), "Failed to delete image");
            ImageError::DeleteFailed(e)
        })?;

        info!(id = %id, "Image deleted");
        Ok(())
    }

    fn settings(&self) -> &ImageSettings {
        &self.settings
    }
}
