//! 粒子运动学重建
//!
//! 由记录中的原始标量字段（pt, theta, phi, m 及探测器质量计数）构造不可变的
//! 粒子值类型，构造时一次性计算赝快度、笛卡尔动量分量和总能量。
//! 两粒子的组合量（ΔR、不变质量、横向不变质量）按需计算，不缓存。

use std::f64::consts::PI;
use std::fmt;

/// 粒子的原始输入字段
///
/// 所有字段缺省为0，与事例日志中缺失的尾部字段语义一致：
/// 3-4个字段的中微子类记录只填充运动学部分。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParticleFields {
    /// 横向动量 pT（GeV）
    pub pt: f64,

    /// 极角 theta（中微子类记录为0）
    pub theta: f64,

    /// 方位角 phi
    pub phi: f64,

    /// 静止质量（GeV）
    pub mass: f64,

    /// 电荷
    pub charge: i32,

    /// 缪子室命中数
    pub chambers: u32,

    /// 像素探测器命中数
    pub pixel_hits: u32,

    /// 硅条探测器命中数
    pub strip_hits: u32,

    /// 径迹拟合质量 χ²/ndof
    pub chi2_per_ndof: f64,

    /// 隔离锥内的能量和
    pub isolation: f64,
}

/// 记录尾部的可选事例标识
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventTag {
    pub event: u64,
    pub run: u64,
    pub lumi: u64,
    pub n_vertices: u32,
    pub n_tracks: u32,
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.event, self.run, self.lumi)
    }
}

/// 不可变粒子
///
/// 构造后所有派生量与输入保持一致，不提供任何修改接口。
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    fields: ParticleFields,
    tag: Option<EventTag>,
    eta: f64,
    px: f64,
    py: f64,
    pz: f64,
    energy: f64,
}

impl Particle {
    /// 从原始字段构造粒子并计算派生量
    ///
    /// `theta == 0` 时 eta 与 pz 强制为0，避免 `tan`/`ln` 的定义域问题。
    /// 任意有限输入都不会失败。
    pub fn new(fields: ParticleFields) -> Self {
        let ParticleFields {
            pt, theta, phi, mass, ..
        } = fields;

        let (eta, pz) = if theta != 0.0 {
            (-(theta / 2.0).tan().ln(), pt / theta.tan())
        } else {
            (0.0, 0.0)
        };

        let px = pt * phi.cos();
        let py = pt * phi.sin();
        let energy = (mass * mass + px * px + py * py + pz * pz).sqrt();

        Self {
            fields,
            tag: None,
            eta,
            px,
            py,
            pz,
            energy,
        }
    }

    /// 构造带事例标识的粒子
    pub fn with_tag(fields: ParticleFields, tag: EventTag) -> Self {
        Self {
            tag: Some(tag),
            ..Self::new(fields)
        }
    }

    /// 构造无极角信息的中微子类粒子（theta = 0）
    pub fn massless(pt: f64, phi: f64, mass: f64) -> Self {
        Self::new(ParticleFields {
            pt,
            phi,
            mass,
            ..Default::default()
        })
    }

    /// 由赝快度反推极角：theta = 2·atan(exp(-eta))
    #[inline]
    pub fn theta_from_eta(eta: f64) -> f64 {
        2.0 * (-eta).exp().atan()
    }

    // ==================== 原始字段访问 ====================

    #[inline]
    pub fn fields(&self) -> &ParticleFields {
        &self.fields
    }

    #[inline]
    pub fn tag(&self) -> Option<&EventTag> {
        self.tag.as_ref()
    }

    #[inline]
    pub fn pt(&self) -> f64 {
        self.fields.pt
    }

    #[inline]
    pub fn theta(&self) -> f64 {
        self.fields.theta
    }

    #[inline]
    pub fn phi(&self) -> f64 {
        self.fields.phi
    }

    #[inline]
    pub fn mass(&self) -> f64 {
        self.fields.mass
    }

    #[inline]
    pub fn charge(&self) -> i32 {
        self.fields.charge
    }

    #[inline]
    pub fn chambers(&self) -> u32 {
        self.fields.chambers
    }

    #[inline]
    pub fn pixel_hits(&self) -> u32 {
        self.fields.pixel_hits
    }

    #[inline]
    pub fn strip_hits(&self) -> u32 {
        self.fields.strip_hits
    }

    #[inline]
    pub fn chi2_per_ndof(&self) -> f64 {
        self.fields.chi2_per_ndof
    }

    // ==================== 派生量 ====================

    /// 赝快度 eta = -ln(tan(theta/2))
    #[inline]
    pub fn eta(&self) -> f64 {
        self.eta
    }

    #[inline]
    pub fn px(&self) -> f64 {
        self.px
    }

    #[inline]
    pub fn py(&self) -> f64 {
        self.py
    }

    #[inline]
    pub fn pz(&self) -> f64 {
        self.pz
    }

    /// 总能量 E = sqrt(m² + |p|²)
    #[inline]
    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// 总动量 |p|
    #[inline]
    pub fn p(&self) -> f64 {
        (self.px * self.px + self.py * self.py + self.pz * self.pz).sqrt()
    }

    /// 由动量分量重新计算的横向动量 sqrt(px² + py²)
    #[inline]
    pub fn transverse_momentum(&self) -> f64 {
        (self.px * self.px + self.py * self.py).sqrt()
    }

    /// 横向能量 E_T = E·pT/|p|
    ///
    /// |p| 为0时返回0（静止粒子没有确定的横向方向）。
    pub fn transverse_energy(&self) -> f64 {
        let p = self.p();
        if p > 0.0 {
            self.transverse_momentum() / p * self.energy
        } else {
            0.0
        }
    }

    /// 隔离因子 = 隔离能量和 / pt
    ///
    /// pt 为0时返回 `+∞`，该粒子必然无法通过隔离截断。
    pub fn isolation_factor(&self) -> f64 {
        if self.fields.pt == 0.0 {
            f64::INFINITY
        } else {
            self.fields.isolation / self.fields.pt
        }
    }

    // ==================== 两粒子组合量 ====================

    /// 角距离 ΔR = sqrt(Δeta² + Δphi²)，Δphi 折回 (-π, π]
    pub fn delta_r(&self, other: &Particle) -> f64 {
        let d_eta = self.eta - other.eta;
        let mut d_phi = self.fields.phi - other.fields.phi;
        if d_phi <= -PI {
            d_phi += 2.0 * PI;
        }
        if d_phi > PI {
            d_phi -= 2.0 * PI;
        }
        (d_eta * d_eta + d_phi * d_phi).sqrt()
    }

    /// 组合四动量的不变质量
    ///
    /// 舍入造成的微小负 m² 截断为0。
    pub fn invariant_mass(&self, other: &Particle) -> f64 {
        let e = self.energy + other.energy;
        let px = self.px + other.px;
        let py = self.py + other.py;
        let pz = self.pz + other.pz;
        (e * e - px * px - py * py - pz * pz).max(0.0).sqrt()
    }

    /// 横向不变质量（用横向能量代替总能量，忽略 z 分量）
    pub fn transverse_invariant_mass(&self, other: &Particle) -> f64 {
        let et = self.transverse_energy() + other.transverse_energy();
        let px = self.px + other.px;
        let py = self.py + other.py;
        (et * et - px * px - py * py).max(0.0).sqrt()
    }
}

impl fmt::Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Particle {{ pt: {:.5}, theta: {:.5}, phi: {:.5}, q: {}, chambers: {}, pixel: {}, strip: {}, iso: {:.5}, E: {:.5} }}",
            self.fields.pt,
            self.fields.theta,
            self.fields.phi,
            self.fields.charge,
            self.fields.chambers,
            self.fields.pixel_hits,
            self.fields.strip_hits,
            self.fields.isolation,
            self.energy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn muon(pt: f64, theta: f64, phi: f64) -> Particle {
        Particle::new(ParticleFields {
            pt,
            theta,
            phi,
            mass: 0.105_658,
            charge: 1,
            ..Default::default()
        })
    }

    #[test]
    fn test_zero_theta_forces_eta_and_pz() {
        let p = Particle::new(ParticleFields {
            pt: 12.0,
            theta: 0.0,
            phi: 1.3,
            mass: 0.1,
            ..Default::default()
        });
        assert_eq!(p.eta(), 0.0);
        assert_eq!(p.pz(), 0.0);
        assert!(p.energy().is_finite());
    }

    #[test]
    fn test_derived_kinematics() {
        let theta = PI / 4.0;
        let p = muon(10.0, theta, 0.0);

        assert!((p.px() - 10.0).abs() < EPS);
        assert!(p.py().abs() < EPS);
        assert!((p.pz() - 10.0).abs() < 1e-9);
        assert!((p.eta() - (-(theta / 2.0).tan().ln())).abs() < EPS);

        let expected_e = (0.105_658_f64.powi(2) + 200.0).sqrt();
        assert!((p.energy() - expected_e).abs() < EPS);
    }

    #[test]
    fn test_theta_from_eta_round_trips() {
        for eta in [-2.3, -0.5, 0.0, 0.7, 2.1] {
            let p = muon(20.0, Particle::theta_from_eta(eta), 0.3);
            assert!((p.eta() - eta).abs() < 1e-9, "eta {eta} -> {}", p.eta());
        }
    }

    #[test]
    fn test_invariant_mass_symmetric() {
        let a = muon(25.0, 1.1, 0.4);
        let b = muon(31.0, 2.0, -2.6);
        let ab = a.invariant_mass(&b);
        let ba = b.invariant_mass(&a);
        assert!((ab - ba).abs() < 1e-9);
        assert!(ab > 0.0);
    }

    #[test]
    fn test_collinear_massless_pair_has_zero_mass() {
        let a = Particle::massless(5.0, 0.0, 0.0);
        let b = Particle::massless(5.0, 0.0, 0.0);
        assert!(a.invariant_mass(&b).abs() < 1e-6);
    }

    #[test]
    fn test_back_to_back_massless_pair() {
        // 背靠背并不给出零质量：只有共线的无质量对 m = 0，
        // 这里动量完全抵消，组合能量全部转化为不变质量 2·pt
        let a = Particle::massless(5.0, 0.0, 0.0);
        let b = Particle::massless(5.0, PI, 0.0);
        assert!((a.invariant_mass(&b) - 10.0).abs() < 1e-6);
        assert!((a.transverse_invariant_mass(&b) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_delta_r_wraps_phi() {
        let a = muon(10.0, PI / 2.0, 3.0);
        let b = muon(10.0, PI / 2.0, -3.0);
        // Δphi = 6.0 折回为 6.0 - 2π
        let expected = (6.0 - 2.0 * PI).abs();
        assert!((a.delta_r(&b) - expected).abs() < 1e-9);
        assert!((a.delta_r(&b) - b.delta_r(&a)).abs() < 1e-12);
    }

    #[test]
    fn test_isolation_factor_zero_pt_is_infinite() {
        let p = Particle::new(ParticleFields {
            isolation: 0.0,
            ..Default::default()
        });
        assert_eq!(p.isolation_factor(), f64::INFINITY);

        let q = Particle::new(ParticleFields {
            pt: 20.0,
            isolation: 4.0,
            ..Default::default()
        });
        assert!((q.isolation_factor() - 0.2).abs() < EPS);
    }

    #[test]
    fn test_transverse_energy_at_rest() {
        let p = Particle::massless(0.0, 0.0, 3.1);
        assert_eq!(p.transverse_energy(), 0.0);
        assert!((p.energy() - 3.1).abs() < EPS);
    }

    #[test]
    fn test_event_tag_display() {
        let tag = EventTag {
            event: 42,
            run: 146_644,
            lumi: 7,
            n_vertices: 1,
            n_tracks: 2,
        };
        let p = Particle::with_tag(ParticleFields::default(), tag);
        assert_eq!(p.tag().map(|t| t.to_string()).as_deref(), Some("42 146644 7"));
    }
}
