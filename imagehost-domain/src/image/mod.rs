use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 图片标识符
/// 同时也是上传目录中的文件名：{uuid}{扩展名}
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    /// 为新上传的图片生成标识符
    /// extension需要包含前导的点，例如 ".png"
    pub fn generate(extension: &str) -> Self {
        Self(format!("{}{}", Uuid::new_v4(), extension))
    }

    /// 解析客户端提交的标识符
    /// 包含路径遍历序列或路径分隔符的标识符返回None
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.contains("..") || raw.contains('/') || raw.contains('\\') {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 已存储的图片
/// 不单独持久化，全部字段都来自文件系统
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub id: ImageId,

    /// 文件大小（字节）
    pub size: u64,

    /// 上传时间（以文件修改时间代替）
    pub uploaded_at: DateTime<Utc>,
}

impl StoredImage {
    pub fn new(id: ImageId, size: u64, uploaded_at: DateTime<Utc>) -> Self {
        Self { id, size, uploaded_at }
    }

    /// 转换为API响应，url由服务地址派生
    pub fn into_response(self, server_url: &str) -> ImageResponse {
        ImageResponse {
            url: cdn_url(server_url, &self.id),
            id: self.id,
            size: self.size,
            uploaded_at: self.uploaded_at,
        }
    }
}

/// 上传和列表接口返回的图片信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResponse {
    pub url: String,
    pub id: ImageId,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// 图片的CDN地址：{server_url}/cdn/{id}
pub fn cdn_url(server_url: &str, id: &ImageId) -> String {
    format!("{}/cdn/{}", server_url.trim_end_matches('/'), id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_traversal() {
        assert!(ImageId::parse("../secret.png").is_none());
        assert!(ImageId::parse("a..b").is_none());
        assert!(ImageId::parse("nested/file.png").is_none());
        assert!(ImageId::parse("nested\\file.png").is_none());
        assert!(ImageId::parse("").is_none());

        let id = ImageId::parse("3f1c.png").unwrap();
        assert_eq!(id.as_str(), "3f1c.png");
    }

    #[test]
    fn test_generate_is_unique() {
        let first = ImageId::generate(".png");
        let second = ImageId::generate(".png");

        assert_ne!(first, second);
        assert!(first.as_str().ends_with(".png"));
        // uuid(36) + ".png"
        assert_eq!(first.as_str().len(), 40);
        assert!(ImageId::parse(first.as_str()).is_some());
    }

    #[test]
    fn test_response_url_and_serialization() {
        let id = ImageId::parse("abc.gif").unwrap();
        let uploaded_at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let response = StoredImage::new(id, 42, uploaded_at)
            .into_response("http://localhost:4200/");

        assert_eq!(response.url, "http://localhost:4200/cdn/abc.gif");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["id"], "abc.gif");
        assert_eq!(json["size"], 42);
        assert_eq!(json["uploaded_at"], "2024-05-01T10:00:00Z");
    }
}
