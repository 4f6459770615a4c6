//! 目录文件列表缓存
//!
//! 只缓存文件路径列表，不缓存内容或搜索结果。缓存以目录指纹（路径、文件数、
//! 最新修改时间）为键保存在磁盘上，读不出来的缓存一律视为未命中。

use crate::finder::error::{FinderError, Result};
use crate::finder::walk::{tree_stats, TreeStats};
use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use std::fs;
use std::hash::Hasher;
use std::path::{Path, PathBuf};

/// 缓存文件格式版本，修改格式时递增
pub const CACHE_FORMAT_VERSION: u32 = 1;

const CACHE_PREFIX: &str = "files_";
const CACHE_SUFFIX: &str = ".cache";

/// 目录指纹
///
/// 文件数和最新修改时间都没变时认为文件列表没变。这只是启发式判断：
/// 在两次搜索之间删一个旧文件、同时新增一个修改时间不超过原最新时间的文件，
/// 指纹不会变化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    root: PathBuf,
    stats: TreeStats,
}

impl Fingerprint {
    /// 遍历目录计算指纹
    pub fn of(root: &Path) -> Self {
        Fingerprint {
            root: root.to_path_buf(),
            stats: tree_stats(root),
        }
    }

    fn root_key(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        hasher.write(self.root.to_string_lossy().as_bytes());
        hasher.finish()
    }

    fn value(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        hasher.write(self.root.to_string_lossy().as_bytes());
        hasher.write_u8(0xff);
        hasher.write_u64(self.stats.file_count);
        hasher.write_u128(self.stats.max_mtime_nanos);
        hasher.finish()
    }
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    root: PathBuf,
    fingerprint: u64,
    paths: Vec<PathBuf>,
}

/// 磁盘上的文件列表缓存
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    dir: PathBuf,
}

impl DirectoryCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        DirectoryCache { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 读取目录的缓存列表，目录有变化或缓存损坏时返回 `None`
    pub fn get(&self, root: &Path) -> Option<Vec<PathBuf>> {
        self.load(&Fingerprint::of(root))
    }

    /// 保存目录的文件列表
    pub fn put(&self, root: &Path, files: &[PathBuf]) -> Result<()> {
        self.store(&Fingerprint::of(root), files)
    }

    /// 按已算好的指纹读取缓存
    pub fn load(&self, fingerprint: &Fingerprint) -> Option<Vec<PathBuf>> {
        let path = self.entry_path(fingerprint);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => {
                log::debug!("未找到缓存: {}", path.display());
                return None;
            }
        };

        let cached: CacheFile = match postcard::from_bytes(&bytes) {
            Ok(cached) => cached,
            Err(e) => {
                log::warn!("缓存文件 {} 已损坏: {}", path.display(), e);
                return None;
            }
        };

        if cached.version != CACHE_FORMAT_VERSION
            || cached.root != fingerprint.root
            || cached.fingerprint != fingerprint.value()
        {
            log::debug!("缓存 {} 与当前目录不一致", path.display());
            return None;
        }

        Some(cached.paths)
    }

    /// 按已算好的指纹写入缓存，并删除同一目录的旧缓存
    pub fn store(&self, fingerprint: &Fingerprint, files: &[PathBuf]) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            FinderError::Cache(format!("无法创建缓存目录 {}: {}", self.dir.display(), e))
        })?;

        let cached = CacheFile {
            version: CACHE_FORMAT_VERSION,
            root: fingerprint.root.clone(),
            fingerprint: fingerprint.value(),
            paths: files.to_vec(),
        };
        let bytes = postcard::to_stdvec(&cached)
            .map_err(|e| FinderError::Cache(format!("序列化文件列表失败: {}", e)))?;

        let path = self.entry_path(fingerprint);
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &path)?;

        self.remove_stale_entries(fingerprint, &path);
        log::debug!("已缓存 {} 个文件路径到 {}", files.len(), path.display());
        Ok(())
    }

    /// 删除全部缓存，返回删除的文件数
    pub fn clear(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(CACHE_PREFIX) && name.ends_with(CACHE_SUFFIX) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!(
            "{}{:016x}_{:016x}{}",
            CACHE_PREFIX,
            fingerprint.root_key(),
            fingerprint.value(),
            CACHE_SUFFIX
        ))
    }

    fn remove_stale_entries(&self, fingerprint: &Fingerprint, current: &Path) {
        let prefix = format!("{}{:016x}_", CACHE_PREFIX, fingerprint.root_key());
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_same_root = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(CACHE_SUFFIX));
            if is_same_root && path != current {
                if let Err(e) = fs::remove_file(&path) {
                    log::debug!("删除旧缓存 {} 失败: {}", path.display(), e);
                }
            }
        }
    }
}
