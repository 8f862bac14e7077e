use imagehost_infra::FileStat;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

/// 条件请求头
#[derive(Debug, Clone, Default)]
pub struct ConditionalHeaders {
    pub if_modified_since: Option<String>,
    pub if_none_match: Option<String>,
}

/// 响应的缓存头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHeaders {
    pub etag: String,
    pub last_modified: String,
    pub cache_control: String,
}

impl CacheHeaders {
    /// 由文件修改时间和大小计算
    /// ETag格式："{hex(修改时间秒数)}-{hex(大小)}"
    pub fn from_stat(stat: &FileStat, cache_control: String) -> Self {
        // fmt_http_date不接受早于epoch的时间
        let modified = if stat.modified < UNIX_EPOCH {
            UNIX_EPOCH
        } else {
            stat.modified
        };
        let secs = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            etag: format!("\"{:x}-{:x}\"", secs, stat.size),
            last_modified: httpdate::fmt_http_date(modified),
            cache_control,
        }
    }

    /// 客户端缓存是否仍然有效
    /// 两个条件都是精确的字符串比较，任意一个匹配即可
    pub fn is_not_modified(&self, conditions: &ConditionalHeaders) -> bool {
        conditions.if_modified_since.as_deref() == Some(self.last_modified.as_str())
            || conditions.if_none_match.as_deref() == Some(self.etag.as_str())
    }
}

/// 获取图片的结果
#[derive(Debug)]
pub enum ServeOutcome {
    /// 304，不返回内容
    NotModified { cache: CacheHeaders },
    /// 200，返回文件内容
    File {
        path: PathBuf,
        media_type: &'static str,
        size: u64,
        cache: CacheHeaders,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn at_secs(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn headers() -> CacheHeaders {
        let stat = FileStat {
            size: 1024,
            modified: at_secs(1_700_000_000),
        };
        CacheHeaders::from_stat(&stat, "public, max-age=60".to_string())
    }

    #[test]
    fn test_validators_format() {
        let cache = headers();
        assert_eq!(cache.etag, "\"6553f100-400\"");
        assert_eq!(cache.last_modified, "Tue, 14 Nov 2023 22:13:20 GMT");
        assert_eq!(cache.cache_control, "public, max-age=60");
    }

    #[test]
    fn test_not_modified_matching() {
        let cache = headers();

        assert!(!cache.is_not_modified(&ConditionalHeaders::default()));
        assert!(cache.is_not_modified(&ConditionalHeaders {
            if_none_match: Some(cache.etag.clone()),
            ..Default::default()
        }));
        assert!(cache.is_not_modified(&ConditionalHeaders {
            if_modified_since: Some(cache.last_modified.clone()),
            ..Default::default()
        }));
        // 只做精确匹配
        assert!(!cache.is_not_modified(&ConditionalHeaders {
            if_none_match: Some("W/\"6553f100-400\"".to_string()),
            if_modified_since: Some("Wed, 15 Nov 2023 00:00:00 GMT".to_string()),
        }));
    }

    #[test]
    fn test_pre_epoch_mtime_is_clamped() {
        let stat = FileStat {
            size: 1,
            modified: UNIX_EPOCH - Duration::from_secs(10),
        };
        let cache = CacheHeaders::from_stat(&stat, String::new());
        assert_eq!(cache.etag, "\"0-1\"");
        assert_eq!(cache.last_modified, "Thu, 01 Jan 1970 00:00:00 GMT");
    }
}
