use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use imagehost_infra::{CaptchaVerifier, LocalImageStorage};
use imagehost_service::{DefaultImageService, ImageService, ImageSettings};
use imagehost_web::AppState;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// 表单字段和data URL前缀的固定余量
const BODY_LIMIT_HEADROOM: u64 = 1024 * 1024;

/// 创建应用路由
pub fn create_router(state: AppState, settings: &ImageSettings) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/upload", post(imagehost_web::upload_image))
        .route("/images", get(imagehost_web::list_images))
        .route(
            "/cdn/:filename",
            get(imagehost_web::serve_image).delete(imagehost_web::delete_image),
        )
        // 上传目录的原样静态访问
        .nest_service("/uploads", ServeDir::new(&settings.upload_dir))
        .layer(DefaultBodyLimit::max(body_limit(settings.max_upload_size)))
        .layer(
            ServiceBuilder::new()
                // 最外层：访问日志
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST, Method::DELETE])
                        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT]),
                ),
        )
        .with_state(state)
}

/// 请求体大小上限
/// base64编码后体积约为原始内容的4/3，按行折断和JSON转义（\r\n、\/）还会继续放大。
/// 上限取两倍，解码后不超限的请求都能进入上传流程，由流程按解码后的长度给出大小错误
fn body_limit(max_upload_size: u64) -> usize {
    let limit = max_upload_size
        .saturating_mul(2)
        .saturating_add(BODY_LIMIT_HEADROOM);
    usize::try_from(limit).unwrap_or(usize::MAX)
}

/// 健康检查端点
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// 初始化应用状态
pub fn init_app_state(
    settings: Arc<ImageSettings>,
    captcha_verifier: Arc<dyn CaptchaVerifier>,
) -> AppState {
    let storage = Arc::new(LocalImageStorage::new(settings.upload_dir.clone()));
    let image_service: Arc<dyn ImageService> = Arc::new(DefaultImageService::new(
        storage,
        captcha_verifier,
        settings,
    ));
    AppState::new(image_service)
}
