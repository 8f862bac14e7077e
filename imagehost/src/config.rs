use imagehost_infra::logging::LogFormat;
use imagehost_service::ImageSettings;
use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};

/// 进程配置
/// 来源（后者覆盖前者）：默认值、imagehost.toml、.env文件、环境变量
/// 环境变量直接使用字段名的大写形式，例如 PORT、UPLOAD_DIR、TURNSTILE_SECRET_KEY
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    /// 字节
    pub max_upload_size: u64,
    /// 秒
    pub cache_max_age: u64,
    /// 未设置时为 http://localhost:{port}
    pub server_url: Option<String>,
    /// 允许的媒体类型前缀
    pub allowed_mime_types: String,
    pub turnstile_secret_key: Option<String>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4200,
            upload_dir: PathBuf::from("uploads"),
            max_upload_size: 500 * 1024 * 1024,
            cache_max_age: 86400,
            server_url: None,
            allowed_mime_types: "image/".to_string(),
            turnstile_secret_key: None,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // .env文件不存在时只使用环境变量
        dotenv::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("imagehost").required(false))
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_upload_size == 0 {
            return Err(AppError::Validation("MAX_UPLOAD_SIZE must be greater than 0".to_string()));
        }
        if self.allowed_mime_types.is_empty() {
            return Err(AppError::Validation("ALLOWED_MIME_TYPES must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn server_url(&self) -> String {
        self.server_url
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }

    /// 转换为图片服务配置
    pub fn image_settings(&self) -> ImageSettings {
        ImageSettings {
            upload_dir: self.upload_dir.clone(),
            max_upload_size: self.max_upload_size,
            cache_max_age: self.cache_max_age,
            server_url: self.server_url(),
            allowed_mime_prefix: self.allowed_mime_types.clone(),
            captcha_secret: self.turnstile_secret_key.clone().unwrap_or_default(),
        }
    }
}
