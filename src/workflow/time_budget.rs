use std::time::Duration;

use tokio::time::Instant;

/// 整条链路的时间预算
///
/// 只决定是否进入下一个阶段，不会打断正在执行的阶段。
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    start: Instant,
    limit: Duration,
}

impl TimeBudget {
    pub fn new(start: Instant, limit: Duration) -> Self {
        Self { start, limit }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// `limit - (now - start)`，不小于 0
    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.elapsed())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining().is_zero()
    }
}
