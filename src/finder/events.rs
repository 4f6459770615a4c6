use crate::finder::config::MatchResult;
use std::sync::mpsc::Sender;

/// 搜索过程中发给调用方的事件
#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    /// 进度消息，`total == 0` 表示只是提示信息
    Progress {
        message: String,
        current: usize,
        total: usize,
    },
    /// 找到一个匹配文件
    Match(MatchResult),
    /// 目前为止的匹配数
    Stats { count: usize },
}

/// 搜索事件的接收方
///
/// 所有回调都在发起搜索的线程上调用。
pub trait SearchObserver {
    fn on_progress(&mut self, _message: &str, _current: usize, _total: usize) {}

    fn on_result(&mut self, _result: &MatchResult) {}

    fn on_stats(&mut self, _count: usize) {}
}

/// 不关心事件时使用
impl SearchObserver for () {}

/// 把事件转发到通道，由调用方按自己的节奏读取
impl SearchObserver for Sender<SearchEvent> {
    fn on_progress(&mut self, message: &str, current: usize, total: usize) {
        let _ = self.send(SearchEvent::Progress {
            message: message.to_string(),
            current,
            total,
        });
    }

    fn on_result(&mut self, result: &MatchResult) {
        let _ = self.send(SearchEvent::Match(result.clone()));
    }

    fn on_stats(&mut self, count: usize) {
        let _ = self.send(SearchEvent::Stats { count });
    }
}

/// 把事件收集到内存中
impl SearchObserver for Vec<SearchEvent> {
    fn on_progress(&mut self, message: &str, current: usize, total: usize) {
        self.push(SearchEvent::Progress {
            message: message.to_string(),
            current,
            total,
        });
    }

    fn on_result(&mut self, result: &MatchResult) {
        self.push(SearchEvent::Match(result.clone()));
    }

    fn on_stats(&mut self, count: usize) {
        self.push(SearchEvent::Stats { count });
    }
}
