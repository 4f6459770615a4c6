use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 一次搜索的停止标志
///
/// 克隆出来的令牌共享同一个标志；标志只会从“进行中”变为“已停止”，
/// 新的搜索使用新的令牌。
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    stopped: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求停止
    pub fn cancel(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}
