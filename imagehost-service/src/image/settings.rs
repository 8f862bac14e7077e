use std::path::PathBuf;

const MB: u64 = 1024 * 1024;

/// 图片服务配置
/// 启动时构造一次，之后只读
#[derive(Debug, Clone)]
pub struct ImageSettings {
    /// 上传目录
    pub upload_dir: PathBuf,

    /// 单个文件最大字节数
    pub max_upload_size: u64,

    /// Cache-Control的max-age（秒）
    pub cache_max_age: u64,

    /// 对外访问地址，用于生成图片url
    pub server_url: String,

    /// 允许的媒体类型前缀，例如 "image/"
    pub allowed_mime_prefix: String,

    /// 人机验证密钥，为空时所有上传都会被拒绝
    pub captcha_secret: String,
}

impl ImageSettings {
    /// 最大上传大小（MB，向下取整），用于错误提示
    pub fn max_upload_size_mb(&self) -> u64 {
        self.max_upload_size / MB
    }

    pub fn cache_control(&self) -> String {
        format!("public, max-age={}", self.cache_max_age)
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            max_upload_size: 500 * MB,
            cache_max_age: 86400,
            server_url: "http://localhost:4200".to_string(),
            allowed_mime_prefix: "image/".to_string(),
            captcha_secret: String::new(),
        }
    }
}
