//! 物理通道配置
//!
//! 同一个截断状态机通过 `ChannelConfig` 参数化为 Z、J/Psi、W 等通道。
//! 阈值、质量窗口、每个截断检查哪一个粒子都属于配置数据而非代码，
//! 可由内置预设创建，也可从 JSON 文件加载（缺省字段取 Z 通道的值）。

use super::log_histogram::LogBinning;
use super::particle::Particle;
use crate::error::{AnalysisError, AnalysisResult, config_error};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 截断检查的粒子范围
///
/// 数据通道只检查领头粒子，蒙特卡罗通道两者都检查。默认 `Leading`。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CutScope {
    /// 只检查第一个粒子
    #[default]
    Leading,
    /// 任一粒子失败即拒绝
    Both,
}

impl CutScope {
    /// 按范围判断粒子对是否未通过 `fails` 描述的截断
    #[inline]
    pub fn rejects<F>(self, first: &Particle, second: &Particle, fails: F) -> bool
    where
        F: Fn(&Particle) -> bool,
    {
        match self {
            CutScope::Leading => fails(first),
            CutScope::Both => fails(first) || fails(second),
        }
    }
}

/// 重建质量的方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MassKind {
    /// 完整四动量不变质量（双缪子通道）
    #[default]
    Invariant,
    /// 横向不变质量（缪子+中微子的W通道）
    Transverse,
}

/// 横向动量截断的形式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MomentumCut {
    /// 两粒子 pt 之和必须落在 [min, max] 内
    PairSumWindow { min: f64, max: f64 },
    /// 单粒子 pt 不得低于 min
    PerParticle { min: f64, scope: CutScope },
}

impl MomentumCut {
    /// 单个粒子是否未通过截断（`PairSumWindow` 没有单粒子含义，始终返回false）
    #[inline]
    pub fn particle_fails(&self, particle: &Particle) -> bool {
        match *self {
            MomentumCut::PerParticle { min, .. } => particle.pt() < min,
            MomentumCut::PairSumWindow { .. } => false,
        }
    }

    /// 粒子对是否未通过截断
    pub fn pair_fails(&self, first: &Particle, second: &Particle) -> bool {
        match *self {
            MomentumCut::PairSumWindow { min, max } => {
                let sum = first.pt() + second.pt();
                sum < min || sum > max
            }
            MomentumCut::PerParticle { scope, .. } => {
                scope.rejects(first, second, |p| self.particle_fails(p))
            }
        }
    }
}

/// 记录字段分隔符
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Delimiter {
    #[default]
    Comma,
    /// 任意连续空白
    Whitespace,
}

/// 第二个字段承载的角度量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AngleField {
    #[default]
    Theta,
    /// 蒙特卡罗记录直接给出赝快度
    Eta,
}

/// 单个物理通道的完整截断配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// 通道名称（报告中显示）
    pub name: String,

    /// 主直方图与质量窗口下限
    pub min_mass: f64,

    /// 主直方图与质量窗口上限
    pub max_mass: f64,

    /// 主直方图的bin数
    pub n_bins: usize,

    pub mass_kind: MassKind,

    /// 质量窗口是否包含边界值
    pub mass_window_inclusive: bool,

    /// 是否要求两粒子电荷相反（W通道中微子不带电，不做此检查）
    pub require_opposite_charge: bool,

    pub max_chi2_per_ndof: f64,
    pub quality_scope: CutScope,

    pub detector_scope: CutScope,

    /// 缪子室命中数下限（低于即拒绝）
    pub min_chambers: u32,
    pub chambers_scope: CutScope,

    /// |eta| 上限
    pub max_abs_eta: f64,
    pub rapidity_scope: CutScope,

    /// ΔR 下限（低于即视为同一喷注）
    pub min_delta_r: f64,

    pub momentum_cut: MomentumCut,

    /// 隔离因子上限
    pub max_isolation: f64,
    pub isolation_scope: CutScope,

    /// 通过全部截断的事例是否按领头粒子电荷拆分为两个系列
    pub split_by_charge: bool,

    pub delimiter: Delimiter,
    pub angle_field: AngleField,

    /// 全谱与诊断直方图的几何分bin
    pub log_binning: LogBinning,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::z()
    }
}

/// 内置预设名称
pub const PRESET_NAMES: &[&str] = &["z", "jpsi", "w", "z-mc"];

impl ChannelConfig {
    /// Z玻色子通道（逗号分隔数据）
    pub fn z() -> Self {
        Self {
            name: "Z".to_string(),
            min_mass: 83.5,
            max_mass: 97.5,
            n_bins: 21,
            mass_kind: MassKind::Invariant,
            mass_window_inclusive: true,
            require_opposite_charge: true,
            max_chi2_per_ndof: 10.0,
            quality_scope: CutScope::Leading,
            detector_scope: CutScope::Leading,
            min_chambers: 11,
            chambers_scope: CutScope::Leading,
            max_abs_eta: 2.1,
            rapidity_scope: CutScope::Leading,
            min_delta_r: 0.7,
            momentum_cut: MomentumCut::PerParticle {
                min: 14.0,
                scope: CutScope::Leading,
            },
            max_isolation: 1.15,
            isolation_scope: CutScope::Leading,
            split_by_charge: false,
            delimiter: Delimiter::Comma,
            angle_field: AngleField::Theta,
            log_binning: LogBinning::default(),
        }
    }

    /// J/Psi介子通道
    pub fn jpsi() -> Self {
        Self {
            name: "J/Psi".to_string(),
            min_mass: 2.9,
            max_mass: 3.3,
            n_bins: 40,
            max_abs_eta: 2.4,
            min_delta_r: 0.3,
            momentum_cut: MomentumCut::PairSumWindow {
                min: 4.0,
                max: 30.0,
            },
            ..Self::z()
        }
    }

    /// W玻色子通道（缪子 + 中微子，横向不变质量，按电荷拆分）
    pub fn w() -> Self {
        Self {
            name: "W".to_string(),
            min_mass: 30.0,
            max_mass: 100.0,
            n_bins: 35,
            mass_kind: MassKind::Transverse,
            require_opposite_charge: false,
            min_chambers: 10,
            momentum_cut: MomentumCut::PerParticle {
                min: 20.0,
                scope: CutScope::Both,
            },
            split_by_charge: true,
            ..Self::z()
        }
    }

    /// Z玻色子蒙特卡罗样本（空白分隔，第二字段为赝快度，双侧截断）
    pub fn z_mc() -> Self {
        Self {
            name: "Z (MC)".to_string(),
            min_mass: 70.0,
            max_mass: 110.0,
            n_bins: 40,
            quality_scope: CutScope::Both,
            detector_scope: CutScope::Both,
            chambers_scope: CutScope::Both,
            rapidity_scope: CutScope::Both,
            momentum_cut: MomentumCut::PerParticle {
                min: 20.0,
                scope: CutScope::Both,
            },
            isolation_scope: CutScope::Both,
            delimiter: Delimiter::Whitespace,
            angle_field: AngleField::Eta,
            ..Self::z()
        }
    }

    /// 按预设名创建通道配置
    pub fn from_preset(name: &str) -> AnalysisResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "z" => Ok(Self::z()),
            "jpsi" | "j/psi" | "j-psi" => Ok(Self::jpsi()),
            "w" => Ok(Self::w()),
            "z-mc" | "zmc" => Ok(Self::z_mc()),
            other => Err(AnalysisError::ConfigError(format!(
                "未知通道预设 '{other}'，可选: {}",
                PRESET_NAMES.join(", ")
            ))),
        }
    }

    /// 从JSON文件加载通道配置并校验
    pub fn from_json_file(path: &Path) -> AnalysisResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| config_error(&format!("无法解析 {}", path.display()), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置的数值合法性
    pub fn validate(&self) -> AnalysisResult<()> {
        if !(self.min_mass.is_finite() && self.max_mass.is_finite())
            || self.min_mass >= self.max_mass
        {
            return Err(AnalysisError::ConfigError(format!(
                "质量范围非法: [{}, {}]",
                self.min_mass, self.max_mass
            )));
        }
        if self.n_bins == 0 {
            return Err(AnalysisError::ConfigError("n_bins 必须大于0".to_string()));
        }
        let thresholds = [
            ("max_chi2_per_ndof", self.max_chi2_per_ndof),
            ("max_abs_eta", self.max_abs_eta),
            ("min_delta_r", self.min_delta_r),
            ("max_isolation", self.max_isolation),
        ];
        for (name, value) in thresholds {
            if value.is_nan() {
                return Err(AnalysisError::ConfigError(format!("{name} 不能为 NaN")));
            }
        }
        if let MomentumCut::PairSumWindow { min, max } = self.momentum_cut
            && min > max
        {
            return Err(AnalysisError::ConfigError(format!(
                "动量窗口非法: [{min}, {max}]"
            )));
        }
        self.log_binning.validate()
    }

    /// 按通道的质量定义重建粒子对质量
    #[inline]
    pub fn reconstruct_mass(&self, first: &Particle, second: &Particle) -> f64 {
        match self.mass_kind {
            MassKind::Invariant => first.invariant_mass(second),
            MassKind::Transverse => first.transverse_invariant_mass(second),
        }
    }

    /// 质量是否落在窗口内
    #[inline]
    pub fn in_mass_window(&self, mass: f64) -> bool {
        if self.mass_window_inclusive {
            mass >= self.min_mass && mass <= self.max_mass
        } else {
            mass > self.min_mass && mass < self.max_mass
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::particle::ParticleFields;

    fn with_pt(pt: f64) -> Particle {
        Particle::new(ParticleFields {
            pt,
            ..Default::default()
        })
    }

    #[test]
    fn test_presets_validate() {
        for name in PRESET_NAMES {
            let config = ChannelConfig::from_preset(name).unwrap();
            config.validate().unwrap();
        }
        assert!(ChannelConfig::from_preset("upsilon").is_err());
    }

    #[test]
    fn test_preset_bins_match_channel_widths() {
        assert_eq!(ChannelConfig::z().n_bins, 21);
        assert_eq!(ChannelConfig::jpsi().n_bins, 40);
        assert_eq!(ChannelConfig::w().n_bins, 35);
    }

    #[test]
    fn test_cut_scope() {
        let low = with_pt(5.0);
        let high = with_pt(50.0);
        let fails = |p: &Particle| p.pt() < 10.0;

        assert!(!CutScope::Leading.rejects(&high, &low, fails));
        assert!(CutScope::Both.rejects(&high, &low, fails));
        assert!(CutScope::Leading.rejects(&low, &high, fails));
    }

    #[test]
    fn test_momentum_cut_forms() {
        let window = MomentumCut::PairSumWindow { min: 4.0, max: 30.0 };
        assert!(window.pair_fails(&with_pt(1.0), &with_pt(2.0)));
        assert!(!window.pair_fails(&with_pt(10.0), &with_pt(12.0)));
        assert!(window.pair_fails(&with_pt(20.0), &with_pt(12.0)));

        let per = MomentumCut::PerParticle {
            min: 20.0,
            scope: CutScope::Both,
        };
        assert!(per.pair_fails(&with_pt(25.0), &with_pt(19.0)));
        assert!(!per.pair_fails(&with_pt(25.0), &with_pt(20.0)));
    }

    #[test]
    fn test_mass_window_inclusivity() {
        let mut config = ChannelConfig::z();
        assert!(config.in_mass_window(83.5));
        assert!(config.in_mass_window(97.5));
        config.mass_window_inclusive = false;
        assert!(!config.in_mass_window(83.5));
        assert!(config.in_mass_window(90.0));
    }

    #[test]
    fn test_partial_json_falls_back_to_z() {
        let json = r#"{ "name": "custom", "max_abs_eta": 2.4, "delimiter": "whitespace",
                        "momentum_cut": { "kind": "pair-sum-window", "min": 4.0, "max": 30.0 } }"#;
        let config: ChannelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.name, "custom");
        assert_eq!(config.max_abs_eta, 2.4);
        assert_eq!(config.delimiter, Delimiter::Whitespace);
        assert_eq!(config.min_mass, 83.5);
        assert_eq!(
            config.momentum_cut,
            MomentumCut::PairSumWindow { min: 4.0, max: 30.0 }
        );
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let config = ChannelConfig {
            min_mass: 100.0,
            max_mass: 50.0,
            ..ChannelConfig::z()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::ConfigError(_))
        ));
    }
}
