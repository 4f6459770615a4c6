use crate::finder::SearchEvent;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";
const BAR_TEMPLATE: &str =
    "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} 匹配: {prefix} | {elapsed_precise} {msg}";

/// 命令行进度条，消费搜索事件
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// 创建进度条，总数未知前显示为旋转指示器
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("0");
        bar.enable_steady_tick(Duration::from_millis(100));
        ProgressManager { bar }
    }

    /// 处理一个搜索事件
    pub fn handle(&self, event: &SearchEvent) {
        match event {
            SearchEvent::Progress {
                message,
                current,
                total,
            } => {
                if *total > 0 {
                    self.ensure_length(*total as u64);
                    self.bar.set_position(*current as u64);
                }
                self.bar.set_message(message.clone());
            }
            SearchEvent::Match(result) => {
                self.bar
                    .println(format!("  {} ({:.2} KB)", result.path.display(), result.size_kb));
            }
            SearchEvent::Stats { count } => self.bar.set_prefix(count.to_string()),
        }
    }

    fn ensure_length(&self, total: u64) {
        if self.bar.length() == Some(total) {
            return;
        }
        self.bar.set_length(total);
        self.bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
    }

    /// 结束进度条，保留最后一条消息
    pub fn finish(&self) {
        self.bar.finish();
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}
