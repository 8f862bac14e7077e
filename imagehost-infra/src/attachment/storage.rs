use super::{FileStat, ImageStorage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use imagehost_domain::{ImageId, StoredImage};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 本地文件存储实现
/// 所有图片平铺在同一个目录下，不保存额外的元数据文件
pub struct LocalImageStorage {
    base_path: PathBuf,
}

impl LocalImageStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// 临时文件以点开头，列表时会被跳过
    fn temp_path(&self, id: &ImageId) -> PathBuf {
        self.base_path.join(format!(".{}.tmp", id))
    }
}

#[async_trait]
impl ImageStorage for LocalImageStorage {
    async fn save(&self, id: &ImageId, content: &[u8]) -> Result<()> {
        let final_path = self.path_of(id);
        let temp_path = self.temp_path(id);

        let written = async {
            fs::write(&temp_path, content).await?;
            fs::rename(&temp_path, &final_path).await
        }
        .await;

        if let Err(e) = written {
            // 写入失败时清理临时文件，忽略清理本身的错误
            let _ = fs::remove_file(&temp_path).await;
            return Err(e).with_context(|| format!("Failed to save file {}", final_path.display()));
        }
        Ok(())
    }

    async fn stat(&self, id: &ImageId) -> Result<Option<FileStat>> {
        let full_path = self.path_of(id);
        let metadata = match fs::metadata(&full_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to stat {}", full_path.display()))
            }
        };
        if metadata.is_dir() {
            return Ok(None);
        }

        Ok(Some(FileStat {
            size: metadata.len(),
            modified: metadata.modified()?,
        }))
    }

    async fn delete(&self, id: &ImageId) -> Result<()> {
        let full_path = self.path_of(id);
        fs::remove_file(&full_path)
            .await
            .with_context(|| format!("Failed to delete {}", full_path.display()))
    }

    async fn list(&self) -> Result<Vec<StoredImage>> {
        let base_path = self.base_path.clone();
        let images = tokio::task::spawn_blocking(move || scan_directory(&base_path))
            .await?
            .with_context(|| format!("Failed to read directory {}", self.base_path.display()))?;
        Ok(images)
    }

    fn path_of(&self, id: &ImageId) -> PathBuf {
        self.base_path.join(id.as_str())
    }
}

/// 扫描上传目录
/// 跳过子目录和点开头的文件；单个条目读取元数据失败时直接跳过，不影响整体结果
fn scan_directory(base_path: &Path) -> std::io::Result<Vec<StoredImage>> {
    let mut images: Vec<StoredImage> = std::fs::read_dir(base_path)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            if name.starts_with('.') {
                return None;
            }
            if entry.file_type().ok()?.is_dir() {
                return None;
            }

            let metadata = std::fs::metadata(entry.path()).ok()?;
            if metadata.is_dir() {
                return None;
            }
            let modified = metadata.modified().ok()?;
            let id = ImageId::parse(&name)?;

            Some(StoredImage::new(id, metadata.len(), DateTime::<Utc>::from(modified)))
        })
        .collect();

    images.sort_by(|a, b| {
        b.uploaded_at
            .cmp(&a.uploaded_at)
            .then_with(|| a.id.as_str().cmp(b.id.as_str()))
    });
    Ok(images)
}
