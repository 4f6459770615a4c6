use std::path::PathBuf;

/// 搜索核心的错误类型
///
/// 单个文件的读取、解码错误不会出现在这里，匹配器内部直接当作“不匹配”处理。
#[derive(Debug, thiserror::Error)]
pub enum FinderError {
    #[error("无效的搜索目录: {0}")]
    InvalidDirectory(PathBuf),

    #[error("至少需要一个搜索关键字")]
    EmptyKeywords,

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("缓存错误: {0}")]
    Cache(String),

    #[error("创建线程池失败: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, FinderError>;
