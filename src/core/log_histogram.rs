//! 几何增长分bin直方图
//!
//! 用于双对数坐标下展示跨越数个数量级的质量谱（约0.3到150 GeV）。
//! bin边界由固定起点、初始步长和每步乘法增长因子生成，
//! 查找使用对边界序列的二分搜索，复杂度 O(log n)。
//!
//! `MultiLogHistogram` 将最多9个命名子直方图排布在3×3网格中，
//! 上限在初始化时强制检查，填充时不再检查。

use crate::error::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 默认分bin：起点0.3，初始步长0.01，每步增长1%，共500步（末端约144）
pub const DEFAULT_LOG_START: f64 = 0.3;
pub const DEFAULT_LOG_INITIAL_STEP: f64 = 0.01;
pub const DEFAULT_LOG_GROWTH: f64 = 1.01;
pub const DEFAULT_LOG_STEPS: usize = 500;

/// 子直方图数量上限（3×3网格）
pub const MAX_SUBHISTOGRAMS: usize = 9;

/// 网格边长
pub const GRID_SIZE: usize = 3;

/// 几何分bin参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogBinning {
    /// 第一条边界
    pub start: f64,

    /// 第一个bin的宽度
    pub initial_step: f64,

    /// 每步宽度的乘法增长因子
    pub growth: f64,

    /// 步数（= bin数，边界数为 steps + 1）
    pub steps: usize,
}

impl Default for LogBinning {
    fn default() -> Self {
        Self {
            start: DEFAULT_LOG_START,
            initial_step: DEFAULT_LOG_INITIAL_STEP,
            growth: DEFAULT_LOG_GROWTH,
            steps: DEFAULT_LOG_STEPS,
        }
    }
}

impl LogBinning {
    /// 校验参数能生成严格单调递增的边界
    pub fn validate(&self) -> AnalysisResult<()> {
        if !self.start.is_finite()
            || !(self.initial_step.is_finite() && self.initial_step > 0.0)
            || !(self.growth.is_finite() && self.growth > 0.0)
            || self.steps == 0
        {
            return Err(AnalysisError::ConfigError(format!(
                "几何分bin参数非法: start={}, initial_step={}, growth={}, steps={}",
                self.start, self.initial_step, self.growth, self.steps
            )));
        }
        Ok(())
    }

    /// 生成边界序列：edge[i+1] = edge[i] + d，d 每步乘以 growth
    pub fn edges(&self) -> Vec<f64> {
        let mut edges = Vec::with_capacity(self.steps + 1);
        let mut edge = self.start;
        let mut step = self.initial_step;
        edges.push(edge);
        for _ in 0..self.steps {
            edge += step;
            edges.push(edge);
            step *= self.growth;
        }
        edges
    }
}

/// 单个几何分bin直方图
#[derive(Debug, Clone, PartialEq)]
pub struct LogHistogram {
    /// 严格递增的边界
    edges: Vec<f64>,

    /// bin计数（长度 = 边界数 - 1）
    counts: Vec<u64>,

    /// 被拒绝的越界填充数
    out_of_range: u64,
}

impl Default for LogHistogram {
    fn default() -> Self {
        Self::from_edges(LogBinning::default().edges())
    }
}

impl LogHistogram {
    /// 按分bin参数创建直方图
    pub fn new(binning: &LogBinning) -> AnalysisResult<Self> {
        binning.validate()?;
        Ok(Self::from_edges(binning.edges()))
    }

    fn from_edges(edges: Vec<f64>) -> Self {
        let counts = vec![0; edges.len().saturating_sub(1)];
        Self {
            edges,
            counts,
            out_of_range: 0,
        }
    }

    /// 二分查找 value 所在的bin
    ///
    /// 返回满足 `edges[i] <= value < edges[i+1]` 的 `i`；
    /// 低于首边界、不小于末边界或 NaN 返回 `None`。
    pub fn find_bin(&self, value: f64) -> Option<usize> {
        let first = *self.edges.first()?;
        let last = *self.edges.last()?;
        if !(value >= first && value < last) {
            return None;
        }
        // partition_point 返回第一个 > value 的边界位置
        Some(self.edges.partition_point(|&edge| edge <= value) - 1)
    }

    /// 填充一个值；越界值只计数并丢弃
    pub fn fill(&mut self, value: f64) -> bool {
        match self.find_bin(value) {
            Some(bin) => {
                self.counts[bin] += 1;
                true
            }
            None => {
                self.out_of_range += 1;
                debug_histogram!("几何直方图越界填充 / log histogram fill out of range: {value}");
                false
            }
        }
    }

    #[inline]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    #[inline]
    pub fn bin_contents(&self) -> &[u64] {
        &self.counts
    }

    /// 泊松误差 sqrt(count)
    pub fn poisson_errors(&self) -> Vec<f64> {
        self.counts.iter().map(|&c| (c as f64).sqrt()).collect()
    }

    #[inline]
    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }

    /// 已填入的条目数（不含越界）
    pub fn entries(&self) -> u64 {
        self.counts.iter().sum()
    }

    #[inline]
    pub fn out_of_range(&self) -> u64 {
        self.out_of_range
    }

    /// 逐bin相加合并另一个直方图（要求边界完全相同）
    pub fn merge(&mut self, other: &LogHistogram) -> AnalysisResult<()> {
        if self.edges != other.edges {
            return Err(AnalysisError::ConfigError(
                "几何直方图分bin不一致，无法合并".to_string(),
            ));
        }
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            *mine += theirs;
        }
        self.out_of_range += other.out_of_range;
        Ok(())
    }
}

/// 3×3网格中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub row: usize,
    pub col: usize,
}

impl GridPosition {
    #[inline]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// 带标题和网格位置的子直方图
#[derive(Debug, Clone, PartialEq)]
pub struct SubHistogram {
    pub title: String,
    pub position: GridPosition,
    pub histogram: LogHistogram,
}

/// 最多9个命名几何直方图的集合
#[derive(Debug, Clone, PartialEq)]
pub struct MultiLogHistogram {
    binning: LogBinning,
    entries: BTreeMap<String, SubHistogram>,

    /// 填充到未初始化名称的次数
    unknown_fills: u64,
}

impl MultiLogHistogram {
    /// 创建空集合，所有子直方图共用同一分bin
    pub fn new(binning: LogBinning) -> AnalysisResult<Self> {
        binning.validate()?;
        Ok(Self {
            binning,
            entries: BTreeMap::new(),
            unknown_fills: 0,
        })
    }

    /// 初始化一个命名子直方图
    ///
    /// # 错误
    ///
    /// 第10个子直方图、重名、网格位置重复或超出3×3都返回 `ConfigError`。
    pub fn init_subhisto(
        &mut self,
        name: &str,
        title: &str,
        position: GridPosition,
    ) -> AnalysisResult<()> {
        if self.entries.len() >= MAX_SUBHISTOGRAMS {
            return Err(AnalysisError::ConfigError(format!(
                "子直方图 '{name}' 无法初始化：最多支持 {MAX_SUBHISTOGRAMS} 个 (3x3)"
            )));
        }
        if self.entries.contains_key(name) {
            return Err(AnalysisError::ConfigError(format!(
                "子直方图 '{name}' 已存在"
            )));
        }
        if position.row >= GRID_SIZE || position.col >= GRID_SIZE {
            return Err(AnalysisError::ConfigError(format!(
                "子直方图 '{name}' 的位置 ({}, {}) 超出 3x3 网格",
                position.row, position.col
            )));
        }
        if self.entries.values().any(|e| e.position == position) {
            return Err(AnalysisError::ConfigError(format!(
                "网格位置 ({}, {}) 已被占用",
                position.row, position.col
            )));
        }

        self.entries.insert(
            name.to_string(),
            SubHistogram {
                title: title.to_string(),
                position,
                histogram: LogHistogram::from_edges(self.binning.edges()),
            },
        );
        Ok(())
    }

    /// 向命名子直方图填充；未知名称或越界值只报告不失败
    pub fn fill_subhisto(&mut self, name: &str, value: f64) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => entry.histogram.fill(value),
            None => {
                self.unknown_fills += 1;
                debug_histogram!("未初始化的子直方图 / unknown sub-histogram: {name}");
                false
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&SubHistogram> {
        self.entries.get(name)
    }

    /// 按网格位置（行优先）遍历
    pub fn iter_grid(&self) -> impl Iterator<Item = (&str, &SubHistogram)> {
        let mut items: Vec<_> = self
            .entries
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
            .collect();
        items.sort_by_key(|(_, entry)| entry.position);
        items.into_iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn binning(&self) -> &LogBinning {
        &self.binning
    }

    #[inline]
    pub fn unknown_fills(&self) -> u64 {
        self.unknown_fills
    }

    /// 按名称逐个合并子直方图（两侧名称集合必须一致）
    pub fn merge(&mut self, other: &MultiLogHistogram) -> AnalysisResult<()> {
        if self.entries.len() != other.entries.len()
            || self.entries.keys().any(|k| !other.entries.contains_key(k))
        {
            return Err(AnalysisError::ConfigError(
                "子直方图集合不一致，无法合并".to_string(),
            ));
        }
        for (name, entry) in self.entries.iter_mut() {
            if let Some(theirs) = other.entries.get(name) {
                entry.histogram.merge(&theirs.histogram)?;
            }
        }
        self.unknown_fills += other.unknown_fills;
        Ok(())
    }
}
