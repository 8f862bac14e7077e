use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use imagehost_infra::mime;
use std::borrow::Cow;
use std::path::Path;

use super::ImageError;

/// 默认扩展名
pub const DEFAULT_EXTENSION: &str = ".bin";

/// 一次上传请求
/// 已经按编码方式解析完毕，但还没有经过人机验证和内容校验
#[derive(Debug)]
pub struct UploadRequest {
    pub body: UploadBody,
    pub captcha_token: Option<String>,
    pub remote_ip: Option<String>,
}

/// 上传内容
#[derive(Debug)]
pub enum UploadBody {
    /// multipart/form-data，没有file字段时为None
    Multipart(Option<MultipartFile>),
    /// application/json
    Json(JsonPayload),
    /// 请求体无法按声明的编码解析，例如缺少boundary的multipart
    Unreadable,
}

/// multipart中的文件
#[derive(Debug)]
pub struct MultipartFile {
    /// 客户端声明的文件名
    pub file_name: Option<String>,
    pub content: FileContent,
}

/// 读取multipart文件的结果
#[derive(Debug)]
pub enum FileContent {
    Loaded(Vec<u8>),
    /// 超过大小限制，读取到这里就停止缓存
    Oversized,
    /// 读取过程中出错
    ReadFailed(String),
}

/// JSON请求体
#[derive(Debug)]
pub enum JsonPayload {
    /// 无法解析的JSON
    Malformed,
    /// 请求体超过了传输层的大小上限
    Oversized,
    /// base64字段，可以带 data:<mime>;base64, 前缀
    Base64(String),
}

/// 解码并检查大小后的内容
#[derive(Debug)]
pub(crate) struct DecodedUpload {
    pub content: Vec<u8>,
    /// 从文件名或data URL推断出的扩展名
    pub declared_extension: Option<String>,
}

impl UploadBody {
    /// 取出文件内容，执行大小限制和解码
    pub(crate) fn decode(
        self,
        max_upload_size: u64,
        max_mb: u64,
    ) -> Result<DecodedUpload, ImageError> {
        match self {
            UploadBody::Unreadable => Err(ImageError::InvalidRequestBody),
            UploadBody::Multipart(None) => Err(ImageError::MissingFile),
            UploadBody::Multipart(Some(file)) => {
                let content = match file.content {
                    FileContent::Loaded(content) => content,
                    FileContent::Oversized => return Err(ImageError::PayloadTooLarge { max_mb }),
                    FileContent::ReadFailed(detail) => return Err(ImageError::IoFailure { detail }),
                };
                if content.len() as u64 > max_upload_size {
                    return Err(ImageError::PayloadTooLarge { max_mb });
                }
                Ok(DecodedUpload {
                    content,
                    declared_extension: file.file_name.as_deref().and_then(extension_from_filename),
                })
            }
            UploadBody::Json(JsonPayload::Malformed) => Err(ImageError::InvalidRequestBody),
            UploadBody::Json(JsonPayload::Oversized) => Err(ImageError::PayloadTooLarge { max_mb }),
            UploadBody::Json(JsonPayload::Base64(data)) => {
                if data.is_empty() {
                    return Err(ImageError::MissingBase64);
                }
                let (declared_mime, payload) = split_data_url(&data);
                let declared_extension = declared_mime
                    .and_then(mime::extension_for)
                    .map(str::to_string);

                let content = decode_base64(payload)?;
                if content.len() as u64 > max_upload_size {
                    return Err(ImageError::PayloadTooLarge { max_mb });
                }
                Ok(DecodedUpload {
                    content,
                    declared_extension,
                })
            }
        }
    }
}

/// 拆分 data:<mime>;base64,<payload>
/// 没有前缀时原样返回
pub fn split_data_url(data: &str) -> (Option<&str>, &str) {
    match data.split_once(";base64,") {
        Some((prefix, payload)) if !prefix.is_empty() => {
            let declared = prefix.strip_prefix("data:").unwrap_or(prefix);
            (Some(declared), payload)
        }
        _ => (None, data),
    }
}

/// 标准base64解码，忽略换行符
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, ImageError> {
    let payload: Cow<'_, str> = if payload.contains(['\r', '\n']) {
        Cow::Owned(payload.chars().filter(|c| !matches!(c, '\r' | '\n')).collect())
    } else {
        Cow::Borrowed(payload)
    };
    STANDARD
        .decode(payload.as_bytes())
        .map_err(|_| ImageError::InvalidEncoding)
}

/// 从客户端文件名中取扩展名（包含前导的点）
/// 只保留图片扩展名，其他扩展名（例如 .html）交给识别结果决定
pub fn extension_from_filename(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    let ext = format!(".{}", ext);
    mime::is_image_extension(&ext).then_some(ext)
}
