//! 文件内容分类
//!
//! 扩展名、文件头魔数和空字节比例的判定规则都以数据表的形式列在这里，
//! 匹配器只关心最终的 [`ContentClass`]。

use crate::finder::util::lowercase_extension;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::Path;

/// 头部采样长度，二进制检测只看这一段
pub const SNIFF_LEN: usize = 8 * 1024;

/// 内容分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    /// 二进制文件，不参与搜索
    Binary,
    /// 普通文本
    Text,
    /// 可能混有二进制段的数据文件，判定更宽松
    MixedPermissive,
}

impl ContentClass {
    /// 头部采样中允许的空字节比例上限
    fn max_nul_ratio(self) -> f64 {
        match self {
            ContentClass::Binary => 0.0,
            ContentClass::Text => 0.01,
            ContentClass::MixedPermissive => 0.9,
        }
    }
}

/// 直接跳过、不读取内容的扩展名
static BINARY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // 压缩包
        "zip", "rar", "7z", "tar", "gz", "bz2", "xz", "iso", "dmg", "jar", "war", "ear",
        // 可执行文件和库
        "exe", "dll", "so", "dylib", "bin", "obj", "o", "a", "lib",
        // 图片
        "png", "jpg", "jpeg", "gif", "bmp", "ico", "tif", "tiff",
        // 音视频
        "mp3", "mp4", "avi", "mkv", "mov", "flv", "wmv", "wav", "flac",
        // 办公文档
        "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
        // 字节码
        "class", "pyc", "pyo", "pyd",
    ]
    .into_iter()
    .collect()
});

/// 混合数据扩展名，按宽松规则判定
const PERMISSIVE_EXTENSIONS: &[&str] = &["dat"];

/// 常见二进制格式的文件头
const MAGIC_SIGNATURES: &[(&str, &[u8])] = &[
    ("pdf", b"%PDF"),
    ("zip", b"PK\x03\x04"),
    ("png", b"\x89PNG"),
    ("jpeg", b"\xff\xd8\xff"),
    ("gif", b"GIF8"),
    ("ole", b"\xd0\xcf\x11\xe0"),
    ("sqlite", b"SQLite format 3\0"),
];

/// 仅根据扩展名分类，不做任何IO
pub fn classify_extension(path: &Path) -> ContentClass {
    match lowercase_extension(path) {
        Some(ext) if BINARY_EXTENSIONS.contains(ext.as_str()) => ContentClass::Binary,
        Some(ext) if PERMISSIVE_EXTENSIONS.contains(&ext.as_str()) => ContentClass::MixedPermissive,
        _ => ContentClass::Text,
    }
}

/// 结合扩展名和头部采样对文件分类
pub fn classify_content(path: &Path, lead: &[u8]) -> ContentClass {
    let class = classify_extension(path);
    if class == ContentClass::Binary {
        return class;
    }

    let sample = &lead[..lead.len().min(SNIFF_LEN)];
    if sample.is_empty() {
        return ContentClass::Binary;
    }

    if let Some((kind, _)) = MAGIC_SIGNATURES
        .iter()
        .find(|(_, magic)| sample.starts_with(magic))
    {
        log::debug!("{} 文件头为 {}，按二进制处理", path.display(), kind);
        return ContentClass::Binary;
    }

    let nul_count = memchr::memchr_iter(0, sample).count();
    if nul_count as f64 / sample.len() as f64 > class.max_nul_ratio() {
        return ContentClass::Binary;
    }

    class
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denylisted_extension_is_binary_without_sampling() {
        assert_eq!(classify_extension(Path::new("a/b/photo.JPG")), ContentClass::Binary);
        assert_eq!(
            classify_content(Path::new("module.pyc"), b"plain text"),
            ContentClass::Binary
        );
    }

    #[test]
    fn plain_text_is_text() {
        assert_eq!(
            classify_content(Path::new("notes.txt"), b"hello world\n"),
            ContentClass::Text
        );
        assert_eq!(classify_extension(Path::new("Makefile")), ContentClass::Text);
    }

    #[test]
    fn nul_heavy_text_file_is_binary() {
        let mut sample = vec![b'a'; 1000];
        sample.extend(std::iter::repeat(0).take(50));
        assert_eq!(
            classify_content(Path::new("data.txt"), &sample),
            ContentClass::Binary
        );
    }

    #[test]
    fn mixed_extension_tolerates_nul_bytes() {
        let mut sample = vec![0u8; 100];
        sample.extend_from_slice(&b"needle in a data file ".repeat(10));
        assert_eq!(
            classify_content(Path::new("records.dat"), &sample),
            ContentClass::MixedPermissive
        );
        assert_eq!(
            classify_content(Path::new("records.dat"), &[0u8; 1000]),
            ContentClass::Binary
        );
    }

    #[test]
    fn svg_and_database_extensions_are_sniffed_not_denied() {
        assert_eq!(classify_extension(Path::new("icon.svg")), ContentClass::Text);
        assert_eq!(
            classify_content(Path::new("icon.svg"), b"<svg xmlns=\"http://www.w3.org/2000/svg\">"),
            ContentClass::Text
        );
        assert_eq!(classify_extension(Path::new("app.db")), ContentClass::Text);
        assert_eq!(
            classify_content(Path::new("app.db"), b"SQLite format 3\0\x10\x00\x01\x01"),
            ContentClass::Binary
        );
        assert_eq!(
            classify_content(Path::new("export.db"), b"id,name\n1,alpha\n"),
            ContentClass::Text
        );
    }

    #[test]
    fn magic_signature_is_binary() {
        assert_eq!(
            classify_content(Path::new("renamed.txt"), b"%PDF-1.7 ..."),
            ContentClass::Binary
        );
        assert_eq!(
            classify_content(Path::new("archive"), b"PK\x03\x04rest"),
            ContentClass::Binary
        );
    }
}
