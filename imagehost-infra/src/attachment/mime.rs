//! 基于文件内容的媒体类型识别
//!
//! 只看字节内容（魔数），不信任客户端声明的Content-Type。

use std::path::Path;
use tokio::io::AsyncReadExt;

/// 无法识别的内容
pub const OCTET_STREAM: &str = "application/octet-stream";

pub const SVG: &str = "image/svg+xml";

/// 识别时最多读取的字节数
pub const SNIFF_LEN: usize = 3072;

/// 识别字节内容的媒体类型
/// 无法识别时返回 application/octet-stream
pub fn detect(content: &[u8]) -> &'static str {
    // SVG是文本格式，没有魔数；需要在infer之前判断，否则带XML声明的SVG会被识别为text/xml
    if looks_like_svg(content) {
        return SVG;
    }

    match infer::get(content) {
        Some(kind) => kind.mime_type(),
        None => OCTET_STREAM,
    }
}

/// 识别已存储文件的媒体类型，只读取文件开头部分
pub async fn detect_from_path(path: &Path) -> std::io::Result<&'static str> {
    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
    Ok(detect(&head))
}

/// 媒体类型对应的文件扩展名（包含前导的点）
pub fn extension_for(media_type: &str) -> Option<&'static str> {
    match media_type {
        "image/jpeg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/gif" => Some(".gif"),
        "image/webp" => Some(".webp"),
        SVG => Some(".svg"),
        _ => None,
    }
}

/// 客户端文件名中可以保留的扩展名（包含前导的点），不区分大小写
pub fn is_image_extension(extension: &str) -> bool {
    const IMAGE_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg"];
    IMAGE_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(extension))
}

/// 跳过XML声明、注释和DOCTYPE后，根元素是否为<svg>
fn looks_like_svg(content: &[u8]) -> bool {
    let head = &content[..content.len().min(SNIFF_LEN)];
    let text = String::from_utf8_lossy(head);
    let mut rest = text.trim_start_matches('\u{feff}').trim_start();

    loop {
        let skipped = if let Some(after) = rest.strip_prefix("<?") {
            after.find("?>").map(|end| &after[end + 2..])
        } else if let Some(after) = rest.strip_prefix("<!--") {
            after.find("-->").map(|end| &after[end + 3..])
        } else if let Some(after) = rest.strip_prefix("<!") {
            after.find('>').map(|end| &after[end + 1..])
        } else {
            break;
        };

        match skipped {
            Some(after) => rest = after.trim_start(),
            None => return false,
        }
    }

    let Some(tag) = rest.get(..4) else {
        return false;
    };
    if !tag.eq_ignore_ascii_case("<svg") {
        return false;
    }
    match rest[4..].chars().next() {
        None => true,
        Some(c) => c.is_ascii_whitespace() || c == '>' || c == '/',
    }
}
