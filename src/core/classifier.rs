//! 粒子对截断流分类器
//!
//! 一个由 `ChannelConfig` 参数化的有序截断状态机，对每个粒子对给出
//! 唯一结论：被某个诊断桶拒绝，或被接受。分类器本身无状态，
//! 是两个粒子与静态配置的纯函数；直方图填充由事例流驱动方完成。
//!
//! ## 两种模式
//!
//! - **Normal**：按固定优先级依次检查，第一个命中的截断决定结果（短路）。
//! - **TagAndProbe**：电荷与ΔR是粒子对级短路；其余每级截断分别更新两个
//!   粒子的有效标志，只有两个粒子都失效时才在该级拒绝。

use super::channel::{ChannelConfig, CutScope, MomentumCut};
use super::log_histogram::GridPosition;
use super::particle::Particle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// W通道正电荷系列键
pub const SERIES_POSITIVE: &str = "positive";

/// W通道负电荷系列键
pub const SERIES_NEGATIVE: &str = "negative";

/// 诊断桶（编号0-8，对应3×3诊断面板中的位置）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    SameCharge,
    SameJet,
    TrackQuality,
    Detector,
    Chambers,
    Rapidity,
    Momentum,
    Isolation,
    MassWindow,
}

impl Bucket {
    /// 按编号排列的全部诊断桶
    pub const ALL: [Bucket; 9] = [
        Bucket::SameCharge,
        Bucket::SameJet,
        Bucket::TrackQuality,
        Bucket::Detector,
        Bucket::Chambers,
        Bucket::Rapidity,
        Bucket::Momentum,
        Bucket::Isolation,
        Bucket::MassWindow,
    ];

    /// 编号（0-8）
    #[inline]
    pub fn id(self) -> usize {
        self as usize
    }

    /// 稳定的字符串键
    pub fn key(self) -> &'static str {
        match self {
            Bucket::SameCharge => "same-charge",
            Bucket::SameJet => "same-jet",
            Bucket::TrackQuality => "track-quality",
            Bucket::Detector => "detector",
            Bucket::Chambers => "chambers",
            Bucket::Rapidity => "rapidity",
            Bucket::Momentum => "momentum",
            Bucket::Isolation => "isolation",
            Bucket::MassWindow => "mass-window",
        }
    }

    /// 面板标题
    pub fn title(self) -> &'static str {
        match self {
            Bucket::SameCharge => "电荷判据 / Charge",
            Bucket::SameJet => "方向判据 / Same jet",
            Bucket::TrackQuality => "径迹质量 / Track quality",
            Bucket::Detector => "探测器判据 / Detector hits",
            Bucket::Chambers => "缪子室数 / Chambers",
            Bucket::Rapidity => "快度判据 / Rapidity",
            Bucket::Momentum => "动量判据 / Momentum",
            Bucket::Isolation => "隔离判据 / Isolation",
            Bucket::MassWindow => "质量窗口 / Mass window",
        }
    }

    /// 3×3面板中的位置（按编号行优先排列）
    #[inline]
    pub fn grid_position(self) -> GridPosition {
        GridPosition::new(self.id() / 3, self.id() % 3)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.key() == key)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// 正常模式的截断优先级（第一个命中者胜出）
pub const NORMAL_ORDER: [Bucket; 9] = [
    Bucket::SameCharge,
    Bucket::TrackQuality,
    Bucket::Detector,
    Bucket::Chambers,
    Bucket::Rapidity,
    Bucket::SameJet,
    Bucket::Momentum,
    Bucket::Isolation,
    Bucket::MassWindow,
];

/// 标签-探针模式中逐粒子更新有效标志的各级截断
pub const TAG_AND_PROBE_STAGES: [Bucket; 6] = [
    Bucket::TrackQuality,
    Bucket::Detector,
    Bucket::Chambers,
    Bucket::Rapidity,
    Bucket::Momentum,
    Bucket::Isolation,
];

/// 分类模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierMode {
    #[default]
    Normal,
    TagAndProbe,
}

impl ClassifierMode {
    pub fn display_name(self) -> &'static str {
        match self {
            ClassifierMode::Normal => "normal",
            ClassifierMode::TagAndProbe => "tag-and-probe",
        }
    }
}

/// 标签-探针模式中两个粒子的有效标志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeFlags {
    pub first: bool,
    pub second: bool,
}

impl ProbeFlags {
    #[inline]
    pub fn any_valid(self) -> bool {
        self.first || self.second
    }

    #[inline]
    pub fn both_valid(self) -> bool {
        self.first && self.second
    }
}

/// 分类结论
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// 第一个未通过的截断对应的诊断桶
    Rejected(Bucket),
    /// 通过全部截断；`series` 区分子群体（W通道按电荷拆分）
    Accepted {
        mass: f64,
        series: Option<&'static str>,
    },
}

/// 单个粒子对的完整分类结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// 按通道质量定义重建的粒子对质量（无论结论如何都给出）
    pub mass: f64,
    pub outcome: Outcome,
    /// 仅标签-探针模式给出：判定时两粒子的有效标志
    pub probes: Option<ProbeFlags>,
}

impl Classification {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, Outcome::Accepted { .. })
    }

    #[inline]
    pub fn bucket(&self) -> Option<Bucket> {
        match self.outcome {
            Outcome::Rejected(bucket) => Some(bucket),
            Outcome::Accepted { .. } => None,
        }
    }
}

/// 参数化的截断流分类器
#[derive(Debug, Clone)]
pub struct PairClassifier {
    config: ChannelConfig,
    mode: ClassifierMode,
}

impl PairClassifier {
    pub fn new(config: ChannelConfig, mode: ClassifierMode) -> Self {
        Self { config, mode }
    }

    #[inline]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    #[inline]
    pub fn mode(&self) -> ClassifierMode {
        self.mode
    }

    /// 对一个粒子对分类（`first` 为领头粒子）
    pub fn classify(&self, first: &Particle, second: &Particle) -> Classification {
        let mass = self.config.reconstruct_mass(first, second);
        match self.mode {
            ClassifierMode::Normal => Classification {
                mass,
                outcome: self.classify_normal(first, second, mass),
                probes: None,
            },
            ClassifierMode::TagAndProbe => {
                let (outcome, flags) = self.classify_tag_and_probe(first, second, mass);
                Classification {
                    mass,
                    outcome,
                    probes: Some(flags),
                }
            }
        }
    }

    fn classify_normal(&self, first: &Particle, second: &Particle, mass: f64) -> Outcome {
        NORMAL_ORDER
            .into_iter()
            .find(|&bucket| self.pair_fails(bucket, first, second, mass))
            .map_or_else(|| self.accept(first, mass), Outcome::Rejected)
    }

    fn classify_tag_and_probe(
        &self,
        first: &Particle,
        second: &Particle,
        mass: f64,
    ) -> (Outcome, ProbeFlags) {
        let mut flags = ProbeFlags {
            first: true,
            second: true,
        };

        // 粒子对级短路，不看有效标志
        for bucket in [Bucket::SameCharge, Bucket::SameJet] {
            if self.pair_fails(bucket, first, second, mass) {
                return (Outcome::Rejected(bucket), flags);
            }
        }

        for bucket in TAG_AND_PROBE_STAGES {
            if bucket == Bucket::Momentum
                && let MomentumCut::PairSumWindow { .. } = self.config.momentum_cut
            {
                // 动量和窗口没有单粒子含义，失败即两者同时失效
                if self.config.momentum_cut.pair_fails(first, second) {
                    flags.first = false;
                    flags.second = false;
                }
            } else {
                flags.first &= !self.particle_fails(bucket, first);
                flags.second &= !self.particle_fails(bucket, second);
            }

            if !flags.any_valid() {
                return (Outcome::Rejected(bucket), flags);
            }
        }

        if !self.config.in_mass_window(mass) {
            return (Outcome::Rejected(Bucket::MassWindow), flags);
        }

        (self.accept(first, mass), flags)
    }

    fn accept(&self, first: &Particle, mass: f64) -> Outcome {
        let series = self.config.split_by_charge.then(|| {
            if first.charge() > 0 {
                SERIES_POSITIVE
            } else {
                SERIES_NEGATIVE
            }
        });
        Outcome::Accepted { mass, series }
    }

    /// 单粒子截断：粒子是否未通过 `bucket` 对应的判据
    ///
    /// 粒子对级判据（电荷、ΔR、质量窗口）对单粒子总是返回false。
    pub fn particle_fails(&self, bucket: Bucket, particle: &Particle) -> bool {
        let c = &self.config;
        match bucket {
            Bucket::TrackQuality => particle.chi2_per_ndof() > c.max_chi2_per_ndof,
            Bucket::Detector => particle.pixel_hits() == 0 || particle.strip_hits() == 0,
            Bucket::Chambers => particle.chambers() < c.min_chambers,
            Bucket::Rapidity => particle.eta().abs() > c.max_abs_eta,
            Bucket::Momentum => c.momentum_cut.particle_fails(particle),
            Bucket::Isolation => particle.isolation_factor() > c.max_isolation,
            Bucket::SameCharge | Bucket::SameJet | Bucket::MassWindow => false,
        }
    }

    /// 正常模式下粒子对是否未通过 `bucket` 对应的判据（按通道配置的检查范围）
    fn pair_fails(&self, bucket: Bucket, first: &Particle, second: &Particle, mass: f64) -> bool {
        let c = &self.config;
        match bucket {
            Bucket::SameCharge => c.require_opposite_charge && first.charge() == second.charge(),
            Bucket::SameJet => first.delta_r(second) < c.min_delta_r,
            Bucket::Momentum => c.momentum_cut.pair_fails(first, second),
            Bucket::MassWindow => !c.in_mass_window(mass),
            _ => self
                .scope_of(bucket)
                .rejects(first, second, |p| self.particle_fails(bucket, p)),
        }
    }

    fn scope_of(&self, bucket: Bucket) -> CutScope {
        let c = &self.config;
        match bucket {
            Bucket::TrackQuality => c.quality_scope,
            Bucket::Detector => c.detector_scope,
            Bucket::Chambers => c.chambers_scope,
            Bucket::Rapidity => c.rapidity_scope,
            Bucket::Isolation => c.isolation_scope,
            _ => CutScope::Leading,
        }
    }
}
