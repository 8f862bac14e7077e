use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use imagehost_domain::ImageResponse;
use imagehost_service::{CacheHeaders, ConditionalHeaders, ImageError, ServeOutcome};
use serde_json::json;
use tokio_util::io::ReaderStream;

use crate::{extractors::UploadForm, ApiError, AppState};

/// 上传图片
/// POST /upload
pub async fn upload_image(
    State(state): State<AppState>,
    UploadForm(request): UploadForm,
) -> Result<Json<ImageResponse>, ApiError> {
    let image = state.image_service.upload(request).await?;
    Ok(Json(image))
}

/// 获取图片
/// GET /cdn/:filename
pub async fn serve_image(
    Path(filename): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let conditions = ConditionalHeaders {
        if_modified_since: header_value(&headers, header::IF_MODIFIED_SINCE),
        if_none_match: header_value(&headers, header::IF_NONE_MATCH),
    };

    match state.image_service.serve(&filename, &conditions).await? {
        ServeOutcome::NotModified { cache } => {
            Ok((StatusCode::NOT_MODIFIED, cache_headers(cache)).into_response())
        }
        ServeOutcome::File {
            path,
            media_type,
            size,
            cache,
        } => {
            // stat之后文件可能已被删除
            let file = tokio::fs::File::open(&path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ImageError::NotFound
                } else {
                    ImageError::DetectionFailed(e)
                }
            })?;

            let content_headers = [
                (header::CONTENT_TYPE, media_type.to_string()),
                (header::CONTENT_LENGTH, size.to_string()),
            ];
            let body = Body::from_stream(ReaderStream::new(file));
            Ok((content_headers, cache_headers(cache), body).into_response())
        }
    }
}

/// 列出图片
/// GET /images
pub async fn list_images(
    State(state): State<AppState>,
) -> Result<Json<Vec<ImageResponse>>, ApiError> {
    let images = state.image_service.list().await?;
    Ok(Json(images))
}

/// 删除图片
/// DELETE /cdn/:filename
pub async fn delete_image(
    Path(filename): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    state.image_service.delete(&filename).await?;
    Ok(Json(json!({ "message": "Image deleted successfully" })).into_response())
}

fn header_value(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn cache_headers(cache: CacheHeaders) -> [(HeaderName, String); 3] {
    [
        (header::CACHE_CONTROL, cache.cache_control),
        (header::ETAG, cache.etag),
        (header::LAST_MODIFIED, cache.last_modified),
    ]
}
