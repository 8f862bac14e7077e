use axum::body::Bytes;
use axum::extract::connect_info::ConnectInfo;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{FromRequest, Multipart, Query, Request};
use axum::http::{header, HeaderMap, StatusCode};
use imagehost_service::{
    FileContent, ImageError, JsonPayload, MultipartFile, UploadBody, UploadRequest,
};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::{ApiError, AppState};

/// 人机验证token的字段名
pub const CAPTCHA_FIELD: &str = "cf-turnstile-response";

/// multipart中文件字段的名称
pub const FILE_FIELD: &str = "file";

/// 上传请求提取器
/// 按Content-Type解析multipart或JSON请求体，同时提取人机验证token和客户端IP
///
/// token放在请求体中名为 cf-turnstile-response 的字段里（multipart表单字段或JSON顶层字段），
/// 兼容旧客户端，也接受同名的查询参数
pub struct UploadForm(pub UploadRequest);

#[derive(Debug, Deserialize)]
struct CaptchaQuery {
    #[serde(rename = "cf-turnstile-response")]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Base64Upload {
    #[serde(default)]
    base64: Option<String>,
    #[serde(default, rename = "cf-turnstile-response")]
    captcha_token: Option<String>,
}

#[async_trait::async_trait]
impl FromRequest<AppState> for UploadForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let query_token = Query::<CaptchaQuery>::try_from_uri(req.uri())
            .ok()
            .and_then(|Query(query)| query.token)
            .filter(|token| !token.is_empty());
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let remote_ip = client_ip(req.headers(), peer);

        let max_upload_size = state.image_service.settings().max_upload_size;

        // 请求体错误记录在UploadBody中，由上传流程在人机验证之后报告
        let (body, body_token) = if content_type.contains("multipart/form-data") {
            match Multipart::from_request(req, state).await {
                Ok(multipart) => read_multipart(multipart, max_upload_size).await,
                Err(_) => (UploadBody::Unreadable, None),
            }
        } else if content_type.contains("application/json") {
            match Bytes::from_request(req, state).await {
                Ok(bytes) => parse_json(&bytes),
                Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                    (UploadBody::Json(JsonPayload::Oversized), None)
                }
                Err(_) => (UploadBody::Unreadable, None),
            }
        } else {
            return Err(ImageError::UnsupportedContentType.into());
        };

        Ok(UploadForm(UploadRequest {
            body,
            captcha_token: body_token.or(query_token),
            remote_ip,
        }))
    }
}

/// 客户端IP：X-Forwarded-For的第一个地址，其次X-Real-IP，最后是连接的对端地址
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// 读取multipart请求体
/// 返回文件内容和表单中的token
async fn read_multipart(
    mut multipart: Multipart,
    max_upload_size: u64,
) -> (UploadBody, Option<String>) {
    let mut file: Option<MultipartFile> = None;
    let mut token = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                if file.is_none() {
                    file = Some(MultipartFile {
                        file_name: None,
                        content: failed_content(e),
                    });
                }
                break;
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) if file.is_none() => {
                let file_name = field.file_name().map(str::to_string);
                let content = read_file_field(field, max_upload_size).await;
                file = Some(MultipartFile { file_name, content });
            }
            Some(CAPTCHA_FIELD) => {
                if let Ok(value) = field.text().await {
                    if !value.is_empty() {
                        token = Some(value);
                    }
                }
            }
            _ => {}
        }
    }

    (UploadBody::Multipart(file), token)
}

/// 读取文件字段
/// 超过大小限制后不再缓存内容，只继续计数
async fn read_file_field(mut field: Field<'_>, max_upload_size: u64) -> FileContent {
    let mut content = Vec::new();
    let mut read_bytes: u64 = 0;

    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                read_bytes += chunk.len() as u64;
                if read_bytes > max_upload_size {
                    if !content.is_empty() {
                        content = Vec::new();
                    }
                } else {
                    content.extend_from_slice(&chunk);
                }
            }
            Ok(None) => break,
            Err(e) => return failed_content(e),
        }
    }

    if read_bytes > max_upload_size {
        FileContent::Oversized
    } else {
        FileContent::Loaded(content)
    }
}

fn failed_content(err: MultipartError) -> FileContent {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        FileContent::Oversized
    } else {
        FileContent::ReadFailed(err.body_text())
    }
}

/// 解析JSON请求体，无法解析时记为Malformed，由上传流程在人机验证之后报告
fn parse_json(bytes: &[u8]) -> (UploadBody, Option<String>) {
    match serde_json::from_slice::<Base64Upload>(bytes) {
        Ok(upload) => (
            UploadBody::Json(JsonPayload::Base64(upload.base64.unwrap_or_default())),
            upload.captcha_token.filter(|token| !token.is_empty()),
        ),
        Err(_) => (UploadBody::Json(JsonPayload::Malformed), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_precedence() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("10.0.0.9"));
        assert_eq!(client_ip(&headers, None), None);

        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.1"));
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("192.0.2.1"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("203.0.113.5"));
    }

    #[test]
    fn test_parse_json() {
        let (body, token) = parse_json(br#"{"base64":"aGk=","cf-turnstile-response":"tok"}"#);
        assert!(matches!(body, UploadBody::Json(JsonPayload::Base64(ref data)) if data == "aGk="));
        assert_eq!(token.as_deref(), Some("tok"));

        let (body, token) = parse_json(br#"{"cf-turnstile-response":""}"#);
        assert!(matches!(body, UploadBody::Json(JsonPayload::Base64(ref data)) if data.is_empty()));
        assert_eq!(token, None);

        let (body, token) = parse_json(b"{not json");
        assert!(matches!(body, UploadBody::Json(JsonPayload::Malformed)));
        assert_eq!(token, None);
    }
}
