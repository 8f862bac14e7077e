pub mod mime;
pub mod storage;

pub use storage::LocalImageStorage;

use async_trait::async_trait;
use imagehost_domain::{ImageId, StoredImage};
use std::path::PathBuf;
use std::time::SystemTime;

/// 文件元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub modified: SystemTime,
}

/// 图片存储trait
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// 保存文件，写入完成后才以最终文件名可见
    async fn save(&self, id: &ImageId, content: &[u8]) -> anyhow::Result<()>;

    /// 获取文件元数据，文件不存在时返回None
    async fn stat(&self, id: &ImageId) -> anyhow::Result<Option<FileStat>>;

    /// 删除文件
    async fn delete(&self, id: &ImageId) -> anyhow::Result<()>;

    /// 列出所有图片，按上传时间倒序
    async fn list(&self) -> anyhow::Result<Vec<StoredImage>>;

    /// 文件的完整路径
    fn path_of(&self, id: &ImageId) -> PathBuf;
}
