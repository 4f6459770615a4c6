use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::{DirEntry, WalkDir};

/// 目录遍历得到的文件列表
#[derive(Debug, Default)]
pub struct TreeListing {
    pub files: Vec<PathBuf>,
    /// 遍历中无法访问的条目数
    pub errors: usize,
}

/// 用于生成目录指纹的统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub file_count: u64,
    /// 所有文件中最新的修改时间（自 UNIX 纪元起的纳秒数）
    pub max_mtime_nanos: u128,
}

fn is_listed_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    // 指向文件的符号链接也算作文件，但不进入链接的目录
    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
}

fn walker(root: &Path) -> walkdir::IntoIter {
    WalkDir::new(root).follow_links(false).into_iter()
}

/// 递归列出目录下的所有文件
///
/// 无法读取的目录会被跳过并计数，已找到的文件照常返回。
pub fn list_files(root: &Path) -> TreeListing {
    let mut listing = TreeListing::default();

    for entry in walker(root) {
        match entry {
            Ok(entry) if is_listed_file(&entry) => listing.files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => {
                log::debug!("遍历目录出错: {}", e);
                listing.errors += 1;
            }
        }
    }

    if listing.errors > 0 {
        log::warn!(
            "遍历 {} 时有 {} 个条目无法访问，已跳过",
            root.display(),
            listing.errors
        );
    }

    listing
}

/// 统计目录下的文件数和最新修改时间
pub fn tree_stats(root: &Path) -> TreeStats {
    let mut stats = TreeStats::default();

    for entry in walker(root).filter_map(|e| e.ok()) {
        if !is_listed_file(&entry) {
            continue;
        }
        stats.file_count += 1;

        let mtime = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(nanos_since_epoch)
            .unwrap_or(0);
        stats.max_mtime_nanos = stats.max_mtime_nanos.max(mtime);
    }

    stats
}

fn nanos_since_epoch(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}
