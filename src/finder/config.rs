use crate::finder::error::{FinderError, Result};
use crate::finder::keywords::normalize_extension;
use directories::ProjectDirs;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::available_parallelism;

/// 单个匹配结果：文件路径和大小（KiB）
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub path: PathBuf,
    pub size_kb: f64,
}

impl MatchResult {
    pub fn new(path: &Path, size_bytes: u64) -> Self {
        MatchResult {
            path: path.to_path_buf(),
            size_kb: size_bytes as f64 / 1024.0,
        }
    }
}

/// 一次搜索的参数，构造时完成校验，开始搜索后不再修改
#[derive(Debug, Clone)]
pub struct SearchRequest {
    root: PathBuf,
    keywords: Vec<String>,
    extensions: Option<Vec<String>>,
    exclude_keywords: Vec<String>,
    ignore_comments: bool,
}

impl SearchRequest {
    /// 创建搜索请求
    ///
    /// 目录必须存在且是目录，关键字去掉空串后不能为空。
    pub fn new<P: AsRef<Path>>(root: P, keywords: Vec<String>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(FinderError::InvalidDirectory(root.to_path_buf()));
        }

        let keywords: Vec<String> = keywords.into_iter().filter(|k| !k.is_empty()).collect();
        if keywords.is_empty() {
            return Err(FinderError::EmptyKeywords);
        }

        let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

        Ok(SearchRequest {
            root,
            keywords,
            extensions: None,
            exclude_keywords: Vec::new(),
            ignore_comments: false,
        })
    }

    /// 设置后缀过滤，`None` 或空列表表示不过滤
    pub fn with_extensions(mut self, extensions: Option<Vec<String>>) -> Self {
        self.extensions = extensions
            .map(|exts| {
                exts.iter()
                    .filter(|e| !e.trim().is_empty())
                    .map(|e| normalize_extension(e))
                    .collect::<Vec<_>>()
            })
            .filter(|exts| !exts.is_empty());
        self
    }

    pub fn with_exclude_keywords(mut self, exclude: Vec<String>) -> Self {
        self.exclude_keywords = exclude.into_iter().filter(|k| !k.is_empty()).collect();
        self
    }

    pub fn with_ignore_comments(mut self, ignore_comments: bool) -> Self {
        self.ignore_comments = ignore_comments;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn extensions(&self) -> Option<&[String]> {
        self.extensions.as_deref()
    }

    pub fn exclude_keywords(&self) -> &[String] {
        &self.exclude_keywords
    }

    pub fn ignore_comments(&self) -> bool {
        self.ignore_comments
    }
}

/// 搜索引擎配置
#[derive(Debug, Clone)]
pub struct FinderConfig {
    /// 文件列表缓存目录，`None` 表示不使用缓存
    pub cache_dir: Option<PathBuf>,
    /// 超过此大小（字节）的文件直接跳过
    pub max_file_size: u64,
    /// 线程池大小
    pub workers: usize,
    /// 每次搜索最多发出的进度更新次数（找到匹配时的更新不计入）
    pub max_progress_updates: usize,
}

pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

impl Default for FinderConfig {
    fn default() -> Self {
        FinderConfig {
            cache_dir: default_cache_dir(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            workers: default_workers(),
            max_progress_updates: 100,
        }
    }
}

impl FinderConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }
}

/// 默认缓存目录：系统的应用缓存目录
pub fn default_cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "file-finder").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// 默认线程数：IO密集型任务，取CPU核心数的4倍
pub fn default_workers() -> usize {
    let cores = available_parallelism().map(|n| n.get()).unwrap_or(4);
    (cores * 4).clamp(4, 64)
}

/// 结果排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// 按文件大小排序，大小相同时按路径排序
pub fn sort_by_size(results: &mut [MatchResult], order: SortOrder) {
    results.sort_by(|a, b| {
        let by_size = a.size_kb.partial_cmp(&b.size_kb).unwrap_or(Ordering::Equal);
        let by_size = match order {
            SortOrder::Ascending => by_size,
            SortOrder::Descending => by_size.reverse(),
        };
        by_size.then_with(|| a.path.cmp(&b.path))
    });
}
