mod config;
mod error;
mod server;


use config::Config;
use error::{AppError, Result};
use imagehost_infra::{logging, TurnstileVerifier};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(config.log_format, "info")
        .map_err(|e| AppError::Internal(format!("Failed to set tracing subscriber: {}", e)))?;
    info!("Starting imagehost...");

    let settings = Arc::new(config.image_settings());
    tokio::fs::create_dir_all(&settings.upload_dir).await.map_err(|e| {
        AppError::Internal(format!(
            "Failed to create upload directory {}: {}",
            settings.upload_dir.display(),
            e
        ))
    })?;
    if settings.captcha_secret.is_empty() {
        warn!("TURNSTILE_SECRET_KEY is not set, all uploads will be rejected");
    }

    // 初始化应用状态和路由
    let app_state = server::init_app_state(settings.clone(), Arc::new(TurnstileVerifier::new()));
    let app = server::create_router(app_state, &settings);

    // 启动HTTP服务器
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    info!("Server listening on {}", addr);
    info!("Upload endpoint: {}/upload", settings.server_url);
    info!("CDN endpoint: {}/cdn/{{filename}}", settings.server_url);
    info!("List endpoint: {}/images", settings.server_url);
    info!("Upload directory: {}", settings.upload_dir.display());
    info!(
        "Max upload size: {} bytes ({} MB)",
        settings.max_upload_size,
        settings.max_upload_size_mb()
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    Ok(())
}
