//! Dimuon Cut-flow Analysis Tool
//!
//! 流式的粒子对截断流分类与直方图统计引擎。
//! 从扁平事例日志中逐行读取粒子记录，两两配对，重建不变质量（或横向质量），
//! 依次施加有序的截断链，并把每个粒子对计入诊断桶或接受直方图。
//!
//! ## 核心特性
//! - 粒子运动学：eta、笛卡尔动量、能量、ΔR、不变质量与横向不变质量
//! - 同一个参数化状态机覆盖 Z、J/Psi、W 与蒙特卡罗通道
//! - 正常模式（第一个失败截断胜出）与标签-探针模式
//! - 等宽多系列直方图与几何分bin直方图（最多9个子直方图的3×3面板）
//! - 文件级 rayon 并行，分析状态可逐元素合并

pub mod core;
pub mod error;
pub mod processing;
pub mod tools;

// 重新导出核心类型
pub use core::{
    Bucket, ChannelConfig, ClassifierMode, LogHistogram, MultiLogHistogram, Outcome,
    PairClassifier, Particle, ParticleFields, UniformHistogram,
};
pub use error::{AnalysisError, AnalysisResult};
pub use processing::{AnalysisReadout, CutflowAnalysis, EventStream, RecordParser};
