//! 批处理状态管理模块
//!
//! 逐文件记录成功/失败，失败按错误类别归档；串行和并行两种实现共享同一个快照类型。

use crate::error::{AnalysisError, ErrorCategory};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// 批处理统计快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchStatsSnapshot {
    /// 成功处理的文件数
    pub processed: usize,
    /// 失败的文件数
    pub failed: usize,
    /// 成功文件中的粒子对总数
    pub pairs: u64,
    /// 错误分类统计（错误类型 -> 失败文件列表）
    pub error_stats: BTreeMap<ErrorCategory, Vec<String>>,
}

impl BatchStatsSnapshot {
    #[inline]
    pub fn total(&self) -> usize {
        self.processed + self.failed
    }

    /// 处理成功率（百分比）
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.processed as f64 * 100.0 / self.total() as f64
        }
    }

    /// 批量报告尾部的统计文本
    pub fn format_footer(&self) -> String {
        let mut output = String::new();
        output.push_str("=====================================\n");
        output.push_str("批量处理统计 / Batch statistics:\n");
        output.push_str(&format!("   总文件数: {}\n", self.total()));
        output.push_str(&format!("   成功处理: {}\n", self.processed));
        output.push_str(&format!("   处理失败: {}\n", self.failed));
        output.push_str(&format!("   粒子对总数: {}\n", self.pairs));
        output.push_str(&format!("   处理成功率: {:.1}%\n", self.success_rate()));

        for (category, files) in &self.error_stats {
            output.push_str(&format!(
                "   [{}] {} 个文件: {}\n",
                category.display_name(),
                files.len(),
                files.join(", ")
            ));
        }
        output
    }
}

/// 串行批处理统计
#[derive(Debug, Default)]
pub struct SerialBatchStats {
    inner: BatchStatsSnapshot,
}

impl SerialBatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个成功文件及其粒子对数
    #[inline]
    pub fn record_success(&mut self, pairs: u64) -> usize {
        self.inner.processed += 1;
        self.inner.pairs += pairs;
        self.inner.processed
    }

    /// 记录一个失败文件，按错误类别归档
    pub fn record_failure(&mut self, filename: String, error: &AnalysisError) -> ErrorCategory {
        let category = ErrorCategory::from_analysis_error(error);
        self.inner.failed += 1;
        self.inner
            .error_stats
            .entry(category)
            .or_default()
            .push(filename);
        category
    }

    pub fn snapshot(&self) -> BatchStatsSnapshot {
        self.inner.clone()
    }
}

/// 并行批处理统计（多线程共享，内部加锁）
#[derive(Debug, Default)]
pub struct ParallelBatchStats {
    inner: Mutex<SerialBatchStats>,
}

impl ParallelBatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, pairs: u64) -> usize {
        match self.inner.lock() {
            Ok(mut stats) => stats.record_success(pairs),
            Err(poisoned) => poisoned.into_inner().record_success(pairs),
        }
    }

    pub fn record_failure(&self, filename: String, error: &AnalysisError) -> ErrorCategory {
        match self.inner.lock() {
            Ok(mut stats) => stats.record_failure(filename, error),
            Err(poisoned) => poisoned.into_inner().record_failure(filename, error),
        }
    }

    pub fn snapshot(&self) -> BatchStatsSnapshot {
        self.inner
            .lock()
            .map(|stats| stats.snapshot())
            .unwrap_or_default()
    }
}
