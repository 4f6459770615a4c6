//! 多关键字文件内容搜索
//!
//! `finder` 是搜索核心，`utils` 提供命令行用到的日志和进度显示。

pub mod finder;
pub mod utils;
