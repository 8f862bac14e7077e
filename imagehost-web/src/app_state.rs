use imagehost_service::ImageService;
use std::sync::Arc;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub image_service: Arc<dyn ImageService>,
}

impl AppState {
    pub fn new(image_service: Arc<dyn ImageService>) -> Self {
        Self { image_service }
    }
}
