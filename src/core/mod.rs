//! 核心算法模块
//!
//! 包含粒子运动学、截断流分类器和直方图的核心数据结构与算法实现。
//! 本层全部为纯计算，不做任何I/O。

#[cfg(debug_assertions)]
macro_rules! debug_histogram {
    ($($arg:tt)*) => {
        eprintln!("[HISTOGRAM_DEBUG] {}", format_args!($($arg)*));
    };
}

#[cfg(not(debug_assertions))]
macro_rules! debug_histogram {
    ($($arg:tt)*) => {};
}

pub mod channel;
pub mod classifier;
pub mod histogram;
pub mod log_histogram;
pub mod particle;

// 重新导出公共接口
pub use channel::{AngleField, ChannelConfig, CutScope, Delimiter, MassKind, MomentumCut};
pub use classifier::{
    Bucket, Classification, ClassifierMode, Outcome, PairClassifier, ProbeFlags,
};
pub use histogram::UniformHistogram;
pub use log_histogram::{GridPosition, LogBinning, LogHistogram, MultiLogHistogram};
pub use particle::{EventTag, Particle, ParticleFields};
