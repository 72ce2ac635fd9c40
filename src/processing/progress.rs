//! 进度与处理速率统计
//!
//! 预扫描得到记录总数后，按已处理记录数与耗时计算完成比例、
//! 当前速率（自上次报告以来）、平均速率和预计剩余时间。
//! 只在整数百分比变化时产生一次报告。

use std::time::{Duration, Instant};

/// 单次进度报告
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// 已处理记录数
    pub processed: usize,

    /// 预期记录总数
    pub total: usize,

    /// 完成比例（0.0-1.0）
    pub fraction: f64,

    /// 自上次报告以来的速率（记录/秒）
    pub current_rate: f64,

    /// 从开始到现在的平均速率（记录/秒）
    pub average_rate: f64,

    /// 预计剩余秒数（速率为0时未知）
    pub eta_secs: Option<f64>,
}

impl ProgressSnapshot {
    #[inline]
    pub fn percent(&self) -> f64 {
        self.fraction * 100.0
    }

    /// 速率换算为 kHz（与日志中的 "Avg Rate" 一致）
    #[inline]
    pub fn average_rate_khz(&self) -> f64 {
        self.average_rate / 1000.0
    }
}

/// 进度跟踪器
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    started: Instant,
    last_instant: Instant,
    last_processed: usize,
    last_percent: u32,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self::starting_at(total, Instant::now())
    }

    /// 以指定起始时刻创建（测试中使用固定时钟）
    pub fn starting_at(total: usize, started: Instant) -> Self {
        Self {
            total,
            started,
            last_instant: started,
            last_processed: 0,
            last_percent: 0,
        }
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    /// 记录进度；整数百分比变化时返回报告
    pub fn update(&mut self, processed: usize) -> Option<ProgressSnapshot> {
        self.update_at(processed, Instant::now())
    }

    pub fn update_at(&mut self, processed: usize, now: Instant) -> Option<ProgressSnapshot> {
        if self.total == 0 {
            return None;
        }
        let percent = (processed.min(self.total) * 100 / self.total) as u32;
        if percent == self.last_percent {
            return None;
        }

        let snapshot = self.snapshot_at(processed, now);
        self.last_percent = percent;
        self.last_instant = now;
        self.last_processed = processed;
        Some(snapshot)
    }

    /// 计算任意时刻的报告（不改变内部状态）
    pub fn snapshot_at(&self, processed: usize, now: Instant) -> ProgressSnapshot {
        let elapsed = now.saturating_duration_since(self.started);
        let since_last = now.saturating_duration_since(self.last_instant);

        let average_rate = rate(processed, elapsed);
        let current_rate = rate(processed.saturating_sub(self.last_processed), since_last);

        let fraction = if self.total == 0 {
            1.0
        } else {
            (processed as f64 / self.total as f64).min(1.0)
        };

        let remaining = self.total.saturating_sub(processed);
        let eta_secs = (average_rate > 0.0).then(|| remaining as f64 / average_rate);

        ProgressSnapshot {
            processed,
            total: self.total,
            fraction,
            current_rate,
            average_rate,
            eta_secs,
        }
    }

    /// 结束时的总耗时和平均速率
    pub fn finish(&self, processed: usize) -> (Duration, ProgressSnapshot) {
        let now = Instant::now();
        (
            now.saturating_duration_since(self.started),
            self.snapshot_at(processed, now),
        )
    }
}

#[inline]
fn rate(count: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}
