//! 等宽多系列直方图
//!
//! 固定范围 [min, max] 等分为 n 个bin，按系列键分别计数
//! （如W通道按电荷拆分的两种颜色），读出时逐bin求和并导出泊松误差。
//!
//! 越界填充不会失败：只计数、在调试构建中报告，然后丢弃。
//!
//! bin区间为左闭右开；`with_inclusive_upper(true)` 时 `max` 本身计入最后一个bin，
//! 与闭区间的质量窗口保持一致。

use crate::error::{AnalysisError, AnalysisResult};
use std::collections::BTreeMap;

/// 未指定系列时使用的键
pub const DEFAULT_SERIES: &str = "default";

/// 等宽多系列直方图
#[derive(Debug, Clone, PartialEq)]
pub struct UniformHistogram {
    min: f64,
    max: f64,
    n_bins: usize,

    /// 每个bin的宽度 (max - min) / n_bins
    step: f64,

    /// 系列键 -> 长度为 n_bins 的计数
    series: BTreeMap<String, Vec<u64>>,

    /// 被拒绝的越界填充数
    out_of_range: u64,

    /// `value == max` 是否计入最后一个bin
    inclusive_upper: bool,
}

impl UniformHistogram {
    /// 创建直方图
    ///
    /// # 错误
    ///
    /// 范围非有限、`min >= max` 或 `n_bins == 0` 时返回 `ConfigError`。
    pub fn new(min: f64, max: f64, n_bins: usize) -> AnalysisResult<Self> {
        if !(min.is_finite() && max.is_finite()) || min >= max || n_bins == 0 {
            return Err(AnalysisError::ConfigError(format!(
                "等宽直方图参数非法: [{min}, {max}] / {n_bins} bins"
            )));
        }
        Ok(Self {
            min,
            max,
            n_bins,
            step: (max - min) / n_bins as f64,
            series: BTreeMap::new(),
            out_of_range: 0,
            inclusive_upper: false,
        })
    }

    /// 设置上边界是否闭合
    pub fn with_inclusive_upper(mut self, inclusive: bool) -> Self {
        self.inclusive_upper = inclusive;
        self
    }

    /// 计算值所在bin：floor((value - min) / step)，越界或 NaN 返回 `None`
    #[inline]
    pub fn bin_index(&self, value: f64) -> Option<usize> {
        if self.inclusive_upper && value == self.max {
            return Some(self.n_bins - 1);
        }
        let bin = ((value - self.min) / self.step).floor();
        if bin >= 0.0 && bin < self.n_bins as f64 {
            Some(bin as usize)
        } else {
            None
        }
    }

    /// 填充到默认系列
    #[inline]
    pub fn fill(&mut self, value: f64) -> bool {
        self.fill_series(value, DEFAULT_SERIES)
    }

    /// 填充到指定系列（首次使用时创建该系列）
    pub fn fill_series(&mut self, value: f64, key: &str) -> bool {
        let Some(bin) = self.bin_index(value) else {
            self.out_of_range += 1;
            debug_histogram!(
                "值 {value} 不在直方图范围 [{}, {}] 内 / value outside histogram range",
                self.min,
                self.max
            );
            return false;
        };

        if !self.series.contains_key(key) {
            self.series.insert(key.to_string(), vec![0; self.n_bins]);
        }
        if let Some(counts) = self.series.get_mut(key) {
            counts[bin] += 1;
        }
        true
    }

    /// 所有系列逐bin求和
    pub fn bin_contents(&self) -> Vec<u64> {
        let mut contents = vec![0; self.n_bins];
        for counts in self.series.values() {
            for (total, &count) in contents.iter_mut().zip(counts) {
                *total += count;
            }
        }
        contents
    }

    /// 泊松误差 sqrt(bin_contents)
    pub fn poisson_errors(&self) -> Vec<f64> {
        self.bin_contents()
            .into_iter()
            .map(|c| (c as f64).sqrt())
            .collect()
    }

    /// n_bins + 1 条边界
    pub fn bin_edges(&self) -> Vec<f64> {
        (0..=self.n_bins)
            .map(|i| self.min + i as f64 * self.step)
            .collect()
    }

    /// bin中心（误差棒的横坐标）
    pub fn bin_centers(&self) -> Vec<f64> {
        (0..self.n_bins)
            .map(|i| self.min + (i as f64 + 0.5) * self.step)
            .collect()
    }

    #[inline]
    pub fn bin_width(&self) -> f64 {
        self.step
    }

    #[inline]
    pub fn min(&self) -> f64 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> f64 {
        self.max
    }

    #[inline]
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// 单个系列的计数
    pub fn series(&self, key: &str) -> Option<&[u64]> {
        self.series.get(key).map(Vec::as_slice)
    }

    /// 已出现的系列键（有序）
    pub fn series_keys(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// 单个系列的条目总数
    pub fn series_total(&self, key: &str) -> u64 {
        self.series(key).map(|c| c.iter().sum()).unwrap_or(0)
    }

    /// 所有系列的条目总数（不含越界）
    pub fn entries(&self) -> u64 {
        self.series.values().flatten().sum()
    }

    #[inline]
    pub fn out_of_range(&self) -> u64 {
        self.out_of_range
    }

    /// 逐bin相加合并（要求范围与bin数完全一致）
    ///
    /// 加法满足交换律与结合律，分块填充后合并与顺序填充结果相同。
    pub fn merge(&mut self, other: &UniformHistogram) -> AnalysisResult<()> {
        if self.min != other.min
            || self.max != other.max
            || self.n_bins != other.n_bins
            || self.inclusive_upper != other.inclusive_upper
        {
            return Err(AnalysisError::ConfigError(format!(
                "等宽直方图分bin不一致，无法合并: [{}, {}]/{} vs [{}, {}]/{}",
                self.min, self.max, self.n_bins, other.min, other.max, other.n_bins
            )));
        }
        for (key, theirs) in &other.series {
            let mine = self
                .series
                .entry(key.clone())
                .or_insert_with(|| vec![0; theirs.len()]);
            for (m, &t) in mine.iter_mut().zip(theirs) {
                *m += t;
            }
        }
        self.out_of_range += other.out_of_range;
        Ok(())
    }
}
