//! 事例日志记录解析
//!
//! 一行文本对应一个粒子。字段顺序固定：
//!
//! ```text
//! pt, theta|eta, phi, m, charge, chambers, pixelHits, stripHits, chi2/ndof, isolation,
//! [eventNum, runNum, lumiNum, nVertices, nTracks, ...]
//! ```
//!
//! - 3个字段：`pt, phi, m`（中微子类记录，theta = 0）
//! - 4个字段：`pt, theta, phi, m`
//! - 10个及以上：完整探测器记录，第11-15个字段为可选事例标识
//!
//! 5-9个字段或任意非数值字段都是致命的解析错误，错误携带从1开始的行号。

use crate::core::channel::{AngleField, ChannelConfig, Delimiter};
use crate::core::particle::{EventTag, Particle, ParticleFields};
use crate::error::{AnalysisError, AnalysisResult, parse_error};
use std::str::FromStr;

/// 中微子类记录的字段数
pub const NEUTRINO_FIELDS: usize = 3;

/// 仅运动学记录的字段数
pub const KINEMATIC_FIELDS: usize = 4;

/// 完整探测器记录的最少字段数
pub const DETECTOR_FIELDS: usize = 10;

/// 按通道的记录布局把文本行解析为粒子
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordParser {
    delimiter: Delimiter,
    angle_field: AngleField,
}

impl RecordParser {
    pub fn new(delimiter: Delimiter, angle_field: AngleField) -> Self {
        Self {
            delimiter,
            angle_field,
        }
    }

    /// 使用通道配置中的分隔符和角度字段
    pub fn for_channel(config: &ChannelConfig) -> Self {
        Self::new(config.delimiter, config.angle_field)
    }

    /// 空行与 `#` 开头的注释行不构成记录
    #[inline]
    pub fn is_skippable(line: &str) -> bool {
        let trimmed = line.trim();
        trimmed.is_empty() || trimmed.starts_with('#')
    }

    /// 按分隔符切分字段（容忍行尾 `\r`）
    pub fn split_fields<'a>(&self, line: &'a str) -> Vec<&'a str> {
        let line = line.trim_end_matches(['\r', '\n']);
        match self.delimiter {
            Delimiter::Comma => line.split(',').map(str::trim).collect(),
            Delimiter::Whitespace => line.split_whitespace().collect(),
        }
    }

    /// 解析一行记录
    ///
    /// `line_no` 为物理行号（从1开始），仅用于错误信息。
    pub fn parse_line(&self, line: &str, line_no: usize) -> AnalysisResult<Particle> {
        let fields = self.split_fields(line);
        let n = fields.len();

        match n {
            NEUTRINO_FIELDS => {
                let pt = number(&fields, 0, "pt", line_no)?;
                let phi = number(&fields, 1, "phi", line_no)?;
                let mass = number(&fields, 2, "m", line_no)?;
                Ok(Particle::massless(pt, phi, mass))
            }
            KINEMATIC_FIELDS => Ok(Particle::new(self.kinematics(&fields, line_no)?)),
            n if n >= DETECTOR_FIELDS => {
                let detector = ParticleFields {
                    charge: number(&fields, 4, "charge", line_no)?,
                    chambers: number(&fields, 5, "chambers", line_no)?,
                    pixel_hits: number(&fields, 6, "pixelHits", line_no)?,
                    strip_hits: number(&fields, 7, "stripHits", line_no)?,
                    chi2_per_ndof: number(&fields, 8, "chi2/ndof", line_no)?,
                    isolation: number(&fields, 9, "isolation", line_no)?,
                    ..self.kinematics(&fields, line_no)?
                };

                if n > DETECTOR_FIELDS {
                    let tag = event_tag(&fields[DETECTOR_FIELDS..], line_no)?;
                    Ok(Particle::with_tag(detector, tag))
                } else {
                    Ok(Particle::new(detector))
                }
            }
            _ => Err(AnalysisError::ParseError {
                line: line_no,
                message: format!(
                    "字段数 {n} 不合法，应为 {NEUTRINO_FIELDS}、{KINEMATIC_FIELDS} 或至少 {DETECTOR_FIELDS} / invalid field count"
                ),
            }),
        }
    }

    /// 前4个运动学字段（第二个字段按通道解释为 theta 或 eta）
    fn kinematics(&self, fields: &[&str], line_no: usize) -> AnalysisResult<ParticleFields> {
        let angle = number::<f64>(fields, 1, "theta", line_no)?;
        let theta = match self.angle_field {
            AngleField::Theta => angle,
            AngleField::Eta => Particle::theta_from_eta(angle),
        };
        Ok(ParticleFields {
            pt: number(fields, 0, "pt", line_no)?,
            theta,
            phi: number(fields, 2, "phi", line_no)?,
            mass: number(fields, 3, "m", line_no)?,
            ..Default::default()
        })
    }
}

/// 解析单个字段；浮点字段拒绝 NaN 与无穷
fn number<T>(fields: &[&str], index: usize, name: &str, line_no: usize) -> AnalysisResult<T>
where
    T: FromStr + FiniteCheck,
    T::Err: std::fmt::Display,
{
    let raw = fields.get(index).copied().unwrap_or_default();
    let value: T = raw
        .parse()
        .map_err(|e| parse_error(line_no, &format!("字段 {name} = '{raw}' 不是数值"), e))?;
    if !value.is_finite_value() {
        return Err(parse_error(line_no, &format!("字段 {name}"), "非有限数值"));
    }
    Ok(value)
}

/// 可选的事例标识（缺失的字段取0，第6个之后的字段不参与分析）
fn event_tag(fields: &[&str], line_no: usize) -> AnalysisResult<EventTag> {
    Ok(EventTag {
        event: optional(fields, 0, "eventNum", line_no)?,
        run: optional(fields, 1, "runNum", line_no)?,
        lumi: optional(fields, 2, "lumiNum", line_no)?,
        n_vertices: optional(fields, 3, "nVertices", line_no)?,
        n_tracks: optional(fields, 4, "nTracks", line_no)?,
    })
}

fn optional<T>(fields: &[&str], index: usize, name: &str, line_no: usize) -> AnalysisResult<T>
where
    T: FromStr + FiniteCheck + Default,
    T::Err: std::fmt::Display,
{
    if index < fields.len() {
        number(fields, index, name, line_no)
    } else {
        Ok(T::default())
    }
}

/// 数值有限性检查（整数恒为有限）
trait FiniteCheck {
    fn is_finite_value(&self) -> bool;
}

impl FiniteCheck for f64 {
    #[inline]
    fn is_finite_value(&self) -> bool {
        self.is_finite()
    }
}

macro_rules! impl_finite_for_int {
    ($($t:ty),*) => {
        $(impl FiniteCheck for $t {
            #[inline]
            fn is_finite_value(&self) -> bool {
                true
            }
        })*
    };
}

impl_finite_for_int!(i32, u32, u64);

#[cfg(test)]
mod tests {
    use super::*;

    const Z_LINE: &str =
        "45.6,1.2791,0.2,0.105658,1,20,3,12,1.2,1.0,1234,163255,42,7,311";

    #[test]
    fn test_three_fields_is_neutrino() {
        let p = RecordParser::default().parse_line("25.0,2.5,0", 1).unwrap();
        assert_eq!(p.pt(), 25.0);
        assert_eq!(p.theta(), 0.0);
        assert_eq!(p.phi(), 2.5);
        assert_eq!(p.eta(), 0.0);
        assert_eq!(p.pz(), 0.0);
    }

    #[test]
    fn test_four_fields_is_kinematic_only() {
        let p = RecordParser::default()
            .parse_line("10.0, 1.5707963, 0.0, 0.1", 2)
            .unwrap();
        assert_eq!(p.theta(), 1.5707963);
        assert_eq!(p.charge(), 0);
        assert!(p.tag().is_none());
    }

    #[test]
    fn test_full_record_with_tag() {
        let p = RecordParser::default().parse_line(Z_LINE, 3).unwrap();
        assert_eq!(p.charge(), 1);
        assert_eq!(p.chambers(), 20);
        assert_eq!(p.pixel_hits(), 3);
        assert_eq!(p.strip_hits(), 12);
        assert_eq!(p.chi2_per_ndof(), 1.2);
        let tag = p.tag().unwrap();
        assert_eq!(tag.event, 1234);
        assert_eq!(tag.n_tracks, 311);
        assert_eq!(tag.to_string(), "1234 163255 42");
    }

    #[test]
    fn test_ten_fields_without_tag() {
        let line = "45.6,1.2791,0.2,0.105658,-1,20,3,12,1.2,1.0";
        let p = RecordParser::default().parse_line(line, 1).unwrap();
        assert_eq!(p.charge(), -1);
        assert!(p.tag().is_none());
    }

    #[test]
    fn test_invalid_field_counts_report_line() {
        let parser = RecordParser::default();
        for line in ["1,2", "1,2,3,4,5", "1,2,3,4,5,6,7,8,9"] {
            match parser.parse_line(line, 17) {
                Err(AnalysisError::ParseError { line, .. }) => assert_eq!(line, 17),
                other => panic!("expected parse error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_non_numeric_field() {
        let err = RecordParser::default()
            .parse_line("45.6,abc,0.2,0.1", 9)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ParseError { line: 9, .. }));
        assert!(err.to_string().contains("theta"));

        let err = RecordParser::default()
            .parse_line("45.6,1.2,0.2,0.1,1.5,20,3,12,1.2,1.0", 4)
            .unwrap_err();
        assert!(err.to_string().contains("charge"));

        assert!(RecordParser::default().parse_line("NaN,1,2", 1).is_err());
    }

    #[test]
    fn test_whitespace_and_eta() {
        let parser = RecordParser::new(Delimiter::Whitespace, AngleField::Eta);
        let p = parser
            .parse_line("30.0   0.0\t1.0 0.1 -1 15 2 9 0.8 0.5\r", 1)
            .unwrap();
        assert!((p.theta() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!(p.eta().abs() < 1e-12);
        assert_eq!(p.charge(), -1);
    }

    #[test]
    fn test_crlf_tolerated() {
        let p = RecordParser::default().parse_line("25.0,2.5,0\r", 1).unwrap();
        assert_eq!(p.mass(), 0.0);
    }

    #[test]
    fn test_skippable_lines() {
        assert!(RecordParser::is_skippable(""));
        assert!(RecordParser::is_skippable("   \r"));
        assert!(RecordParser::is_skippable("# pt,theta,phi"));
        assert!(!RecordParser::is_skippable("1,2,3"));
    }
}
