use crate::finder::MatchResult;
use log::{LevelFilter, SetLoggerError};
use simple_logger::SimpleLogger;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// 结果日志文件
pub const RESULT_LOG_FILE: &str = "file_finder.log";

/// 初始化日志系统
pub fn init_logger(enable_log: bool) -> Result<(), SetLoggerError> {
    if enable_log {
        SimpleLogger::new().with_level(LevelFilter::Info).init()
    } else {
        SimpleLogger::new().with_level(LevelFilter::Off).init()
    }
}

/// 把搜索结果追加到日志文件
pub fn log_results_to_file(path: &Path, keywords: &str, results: &[MatchResult]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    writeln!(file, "关键字: {}，找到 {} 个匹配文件:", keywords, results.len())?;
    for result in results {
        writeln!(file, "{} - {:.2} KB", result.path.display(), result.size_kb)?;
    }
    writeln!(file)?;
    Ok(())
}
