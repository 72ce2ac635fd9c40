//! 截断流分析状态
//!
//! `CutflowAnalysis` 持有一次运行的全部直方图与计数器：
//! 全谱（几何分bin）、9个诊断桶面板、通过全部截断的等宽质量直方图。
//! 每个粒子对先填入全谱，再由分类器给出结论，最后填入对应桶或接受直方图。
//!
//! 不变量：`pairs == accepted + Σ bucket_counts`。
//!
//! 同一配置下两个分析状态可以逐元素相加合并，与顺序处理结果相同，
//! 批量模式按文件并行后以此汇总。

use super::event_stream::EventPair;
use crate::core::channel::ChannelConfig;
use crate::core::classifier::{
    Bucket, Classification, ClassifierMode, Outcome, PairClassifier,
};
use crate::core::histogram::{DEFAULT_SERIES, UniformHistogram};
use crate::core::log_histogram::{LogBinning, LogHistogram, MultiLogHistogram};
use crate::core::particle::Particle;
use crate::error::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 一次运行的完整分析状态
#[derive(Debug, Clone)]
pub struct CutflowAnalysis {
    classifier: PairClassifier,

    /// 全部粒子对的质量谱
    spectrum: LogHistogram,

    /// 9个诊断桶，各自记录被拒绝粒子对的质量
    filters: MultiLogHistogram,

    /// 通过全部截断的粒子对质量
    accepted: UniformHistogram,

    bucket_counts: [u64; 9],
    pairs: u64,
    accepted_count: u64,

    /// 按系列键统计的接受数（W通道的电荷计数）
    series_counts: BTreeMap<String, u64>,

    /// 标签-探针模式：接受时只有一个/两个粒子有效的对数
    probe_single: u64,
    probe_double: u64,

    /// 按运行号统计的粒子对数（只统计带事例标签的记录）
    runs: BTreeMap<u64, u64>,
}

impl CutflowAnalysis {
    /// 为通道创建空分析状态
    ///
    /// # 错误
    ///
    /// 通道配置不合法时返回 `ConfigError`。
    pub fn new(config: ChannelConfig, mode: ClassifierMode) -> AnalysisResult<Self> {
        config.validate()?;

        let spectrum = LogHistogram::new(&config.log_binning)?;
        let mut filters = MultiLogHistogram::new(config.log_binning)?;
        for bucket in Bucket::ALL {
            filters.init_subhisto(bucket.key(), bucket.title(), bucket.grid_position())?;
        }
        let accepted = UniformHistogram::new(config.min_mass, config.max_mass, config.n_bins)?
            .with_inclusive_upper(config.mass_window_inclusive);

        Ok(Self {
            classifier: PairClassifier::new(config, mode),
            spectrum,
            filters,
            accepted,
            bucket_counts: [0; 9],
            pairs: 0,
            accepted_count: 0,
            series_counts: BTreeMap::new(),
            probe_single: 0,
            probe_double: 0,
            runs: BTreeMap::new(),
        })
    }

    /// 处理一个粒子对
    pub fn record(&mut self, first: &Particle, second: &Particle) -> Classification {
        let result = self.classifier.classify(first, second);
        self.pairs += 1;
        self.spectrum.fill(result.mass);
        if let Some(tag) = first.tag() {
            *self.runs.entry(tag.run).or_insert(0) += 1;
        }

        match result.outcome {
            Outcome::Rejected(bucket) => {
                self.bucket_counts[bucket.id()] += 1;
                self.filters.fill_subhisto(bucket.key(), result.mass);
            }
            Outcome::Accepted { mass, series } => {
                self.accepted_count += 1;
                let key = series.unwrap_or(DEFAULT_SERIES);
                self.accepted.fill_series(mass, key);
                *self.series_counts.entry(key.to_string()).or_insert(0) += 1;

                if let Some(flags) = result.probes {
                    if flags.both_valid() {
                        self.probe_double += 1;
                    } else {
                        self.probe_single += 1;
                    }
                }
            }
        }
        result
    }

    #[inline]
    pub fn record_pair(&mut self, pair: &EventPair) -> Classification {
        self.record(&pair.first, &pair.second)
    }

    /// 逐元素合并另一个分析状态（要求通道配置与模式完全相同）
    pub fn merge(&mut self, other: &CutflowAnalysis) -> AnalysisResult<()> {
        if self.classifier.config() != other.classifier.config()
            || self.classifier.mode() != other.classifier.mode()
        {
            return Err(AnalysisError::ConfigError(format!(
                "通道配置不一致，无法合并: {} ({}) vs {} ({})",
                self.config().name,
                self.mode().display_name(),
                other.config().name,
                other.mode().display_name()
            )));
        }

        self.spectrum.merge(&other.spectrum)?;
        self.filters.merge(&other.filters)?;
        self.accepted.merge(&other.accepted)?;

        for (mine, theirs) in self.bucket_counts.iter_mut().zip(other.bucket_counts) {
            *mine += theirs;
        }
        self.pairs += other.pairs;
        self.accepted_count += other.accepted_count;
        for (key, count) in &other.series_counts {
            *self.series_counts.entry(key.clone()).or_insert(0) += count;
        }
        self.probe_single += other.probe_single;
        self.probe_double += other.probe_double;
        for (run, count) in &other.runs {
            *self.runs.entry(*run).or_insert(0) += count;
        }
        Ok(())
    }

    // ==================== 读出 ====================

    #[inline]
    pub fn config(&self) -> &ChannelConfig {
        self.classifier.config()
    }

    #[inline]
    pub fn mode(&self) -> ClassifierMode {
        self.classifier.mode()
    }

    #[inline]
    pub fn pairs(&self) -> u64 {
        self.pairs
    }

    #[inline]
    pub fn accepted_count(&self) -> u64 {
        self.accepted_count
    }

    #[inline]
    pub fn bucket_count(&self, bucket: Bucket) -> u64 {
        self.bucket_counts[bucket.id()]
    }

    pub fn rejected_count(&self) -> u64 {
        self.bucket_counts.iter().sum()
    }

    #[inline]
    pub fn spectrum(&self) -> &LogHistogram {
        &self.spectrum
    }

    #[inline]
    pub fn filters(&self) -> &MultiLogHistogram {
        &self.filters
    }

    #[inline]
    pub fn accepted_histogram(&self) -> &UniformHistogram {
        &self.accepted
    }

    #[inline]
    pub fn series_counts(&self) -> &BTreeMap<String, u64> {
        &self.series_counts
    }

    /// 标签-探针接受对中（单个有效, 两个都有效）的数量
    #[inline]
    pub fn probe_counts(&self) -> (u64, u64) {
        (self.probe_single, self.probe_double)
    }

    /// 运行号 -> 粒子对数
    #[inline]
    pub fn run_counts(&self) -> &BTreeMap<u64, u64> {
        &self.runs
    }

    /// 全部直方图中被丢弃的越界填充数
    pub fn out_of_range_total(&self) -> u64 {
        let filters: u64 = self
            .filters
            .iter_grid()
            .map(|(_, sub)| sub.histogram.out_of_range())
            .sum();
        self.spectrum.out_of_range() + filters + self.accepted.out_of_range()
    }

    /// 生成可序列化的读出快照
    pub fn readout(&self) -> AnalysisReadout {
        let config = self.config();
        let buckets = Bucket::ALL
            .into_iter()
            .map(|bucket| BucketReadout {
                bucket,
                title: bucket.title().to_string(),
                count: self.bucket_count(bucket),
                bin_contents: self
                    .filters
                    .get(bucket.key())
                    .map(|sub| sub.histogram.bin_contents().to_vec())
                    .unwrap_or_default(),
            })
            .collect();

        let series = self
            .accepted
            .series_keys()
            .map(|key| {
                let counts = self.accepted.series(key).unwrap_or_default();
                (key.to_string(), counts.to_vec())
            })
            .collect();

        AnalysisReadout {
            channel: config.name.clone(),
            mode: self.mode(),
            min_mass: config.min_mass,
            max_mass: config.max_mass,
            n_bins: config.n_bins,
            pairs: self.pairs,
            accepted: self.accepted_count,
            series_counts: self.series_counts.clone(),
            tag_and_probe: (self.mode() == ClassifierMode::TagAndProbe).then_some(ProbeReadout {
                single_valid: self.probe_single,
                double_valid: self.probe_double,
            }),
            buckets,
            bin_contents: self.accepted.bin_contents(),
            bin_edges: self.accepted.bin_edges(),
            poisson_errors: self.accepted.poisson_errors(),
            series,
            log_binning: *self.filters.binning(),
            spectrum_contents: self.spectrum.bin_contents().to_vec(),
            out_of_range: self.out_of_range_total(),
            runs: self.runs.clone(),
        }
    }
}

/// 单个诊断桶的读出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketReadout {
    pub bucket: Bucket,
    pub title: String,
    pub count: u64,
    pub bin_contents: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReadout {
    pub single_valid: u64,
    pub double_valid: u64,
}

/// 分析结果快照（JSON导出格式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReadout {
    pub channel: String,
    pub mode: ClassifierMode,
    pub min_mass: f64,
    pub max_mass: f64,
    pub n_bins: usize,
    pub pairs: u64,
    pub accepted: u64,
    pub series_counts: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_and_probe: Option<ProbeReadout>,
    pub buckets: Vec<BucketReadout>,

    /// 接受直方图：逐bin计数、n_bins + 1 条边界、泊松误差
    pub bin_contents: Vec<u64>,
    pub bin_edges: Vec<f64>,
    pub poisson_errors: Vec<f64>,

    /// 接受直方图按系列拆分的计数
    pub series: BTreeMap<String, Vec<u64>>,

    pub log_binning: LogBinning,
    pub spectrum_contents: Vec<u64>,
    pub out_of_range: u64,

    /// 运行号 -> 粒子对数
    #[serde(default)]
    pub runs: BTreeMap<u64, u64>,
}

impl AnalysisReadout {
    /// 被拒绝的粒子对总数
    pub fn rejected(&self) -> u64 {
        self.buckets.iter().map(|b| b.count).sum()
    }

    /// 接受率（百分比）
    pub fn acceptance_percent(&self) -> f64 {
        if self.pairs == 0 {
            0.0
        } else {
            self.accepted as f64 * 100.0 / self.pairs as f64
        }
    }

    /// 并入另一份导出的读出（同一通道、模式与分bin）
    ///
    /// 计数逐元素相加，泊松误差按合并后的计数重新计算。
    pub fn merge(&mut self, other: &AnalysisReadout) -> AnalysisResult<()> {
        let same_binning = self.channel == other.channel
            && self.mode == other.mode
            && self.min_mass == other.min_mass
            && self.max_mass == other.max_mass
            && self.n_bins == other.n_bins
            && self.log_binning == other.log_binning
            && self.buckets.len() == other.buckets.len()
            && self
                .buckets
                .iter()
                .zip(&other.buckets)
                .all(|(mine, theirs)| mine.bucket == theirs.bucket)
            && self.spectrum_contents.len() == other.spectrum_contents.len();
        if !same_binning {
            return Err(AnalysisError::ConfigError(format!(
                "读出无法合并: {} ({}) 与 {} ({}) 的分bin不一致",
                self.channel,
                self.mode.display_name(),
                other.channel,
                other.mode.display_name()
            )));
        }

        self.pairs += other.pairs;
        self.accepted += other.accepted;
        self.out_of_range += other.out_of_range;
        add_counts(&mut self.bin_contents, &other.bin_contents);
        add_counts(&mut self.spectrum_contents, &other.spectrum_contents);

        for (mine, theirs) in self.buckets.iter_mut().zip(&other.buckets) {
            mine.count += theirs.count;
            add_counts(&mut mine.bin_contents, &theirs.bin_contents);
        }

        for (key, count) in &other.series_counts {
            *self.series_counts.entry(key.clone()).or_insert(0) += count;
        }
        for (run, count) in &other.runs {
            *self.runs.entry(*run).or_insert(0) += count;
        }
        for (key, counts) in &other.series {
            let entry = self
                .series
                .entry(key.clone())
                .or_insert_with(|| vec![0; counts.len()]);
            add_counts(entry, counts);
        }

        self.tag_and_probe = match (self.tag_and_probe, other.tag_and_probe) {
            (Some(a), Some(b)) => Some(ProbeReadout {
                single_valid: a.single_valid + b.single_valid,
                double_valid: a.double_valid + b.double_valid,
            }),
            (a, b) => a.or(b),
        };

        self.poisson_errors = self
            .bin_contents
            .iter()
            .map(|&c| (c as f64).sqrt())
            .collect();
        Ok(())
    }
}

fn add_counts(target: &mut Vec<u64>, source: &[u64]) {
    if target.len() < source.len() {
        target.resize(source.len(), 0);
    }
    for (t, s) in target.iter_mut().zip(source) {
        *t += s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::particle::{EventTag, ParticleFields};
    use std::f64::consts::PI;

    fn muon(pt: f64, phi: f64, charge: i32) -> Particle {
        Particle::new(ParticleFields {
            pt,
            theta: Particle::theta_from_eta(0.3),
            phi,
            mass: 0.105_658,
            charge,
            chambers: 20,
            pixel_hits: 3,
            strip_hits: 12,
            chi2_per_ndof: 1.2,
            isolation: 1.0,
        })
    }

    /// 混合接受与各类拒绝的粒子对序列
    fn mixed_pairs() -> Vec<(Particle, Particle)> {
        (0..90)
            .map(|i| {
                let pt = 20.0 + (i % 30) as f64 * 1.1;
                let charge = if i % 7 == 0 { -1 } else { 1 };
                (muon(pt, 0.1, 1), muon(pt, 0.1 + PI - (i % 4) as f64 * 0.9, -charge))
            })
            .collect()
    }

    fn run(pairs: &[(Particle, Particle)]) -> CutflowAnalysis {
        let mut analysis = CutflowAnalysis::new(ChannelConfig::z(), ClassifierMode::Normal).unwrap();
        for (a, b) in pairs {
            analysis.record(a, b);
        }
        analysis
    }

    #[test]
    fn test_filters_laid_out_in_grid() {
        let analysis = CutflowAnalysis::new(ChannelConfig::jpsi(), ClassifierMode::Normal).unwrap();
        let titles: Vec<_> = analysis.filters().iter_grid().map(|(name, _)| name).collect();
        let expected: Vec<_> = Bucket::ALL.iter().map(|b| b.key()).collect();
        assert_eq!(titles, expected);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ChannelConfig {
            n_bins: 0,
            ..ChannelConfig::z()
        };
        assert!(CutflowAnalysis::new(config, ClassifierMode::Normal).is_err());
    }

    #[test]
    fn test_pairs_equal_accepted_plus_buckets() {
        let analysis = run(&mixed_pairs());
        assert_eq!(analysis.pairs(), 90);
        assert_eq!(
            analysis.pairs(),
            analysis.accepted_count() + analysis.rejected_count()
        );
        assert!(analysis.accepted_count() > 0);
        assert!(analysis.bucket_count(Bucket::SameCharge) > 0);

        // 全谱接收每一个对（越界的除外）
        assert_eq!(
            analysis.spectrum().entries() + analysis.spectrum().out_of_range(),
            90
        );
    }

    #[test]
    fn test_merge_equals_sequential() {
        let pairs = mixed_pairs();
        let sequential = run(&pairs);

        let (head, tail) = pairs.split_at(37);
        let mut merged = run(tail);
        merged.merge(&run(head)).unwrap();

        assert_eq!(merged.readout(), sequential.readout());
    }

    #[test]
    fn test_merge_rejects_different_channel() {
        let mut z = CutflowAnalysis::new(ChannelConfig::z(), ClassifierMode::Normal).unwrap();
        let jpsi = CutflowAnalysis::new(ChannelConfig::jpsi(), ClassifierMode::Normal).unwrap();
        assert!(z.merge(&jpsi).is_err());

        let tnp = CutflowAnalysis::new(ChannelConfig::z(), ClassifierMode::TagAndProbe).unwrap();
        assert!(z.merge(&tnp).is_err());
    }

    #[test]
    fn test_readout_merge_matches_analysis_merge() {
        let pairs = mixed_pairs();
        let (head, tail) = pairs.split_at(50);

        let mut readout = run(head).readout();
        readout.merge(&run(tail).readout()).unwrap();

        assert_eq!(readout, run(&pairs).readout());
    }

    #[test]
    fn test_readout_merge_rejects_other_binning() {
        let mut z = run(&mixed_pairs()).readout();
        let jpsi = CutflowAnalysis::new(ChannelConfig::jpsi(), ClassifierMode::Normal)
            .unwrap()
            .readout();
        let err = z.merge(&jpsi).unwrap_err();
        assert!(matches!(err, AnalysisError::ConfigError(_)));
    }

    #[test]
    fn test_readout_triple() {
        let analysis = run(&mixed_pairs());
        let readout = analysis.readout();

        assert_eq!(readout.bin_contents.len(), 21);
        assert_eq!(readout.bin_edges.len(), 22);
        assert_eq!(readout.poisson_errors.len(), 21);
        assert_eq!(readout.bin_contents.iter().sum::<u64>(), readout.accepted);
        assert_eq!(readout.rejected() + readout.accepted, readout.pairs);
        assert!(readout.tag_and_probe.is_none());

        let json = serde_json::to_string(&readout).unwrap();
        let back: AnalysisReadout = serde_json::from_str(&json).unwrap();
        assert_eq!(back.buckets.len(), 9);
        assert_eq!(back.pairs, readout.pairs);
    }

    #[test]
    fn test_w_channel_series_tally() {
        let mut analysis = CutflowAnalysis::new(ChannelConfig::w(), ClassifierMode::Normal).unwrap();
        let neutrino = Particle::massless(40.0, PI, 0.0);
        analysis.record(&muon(40.0, 0.0, 1), &neutrino);
        analysis.record(&muon(40.0, 0.0, 1), &neutrino);
        analysis.record(&muon(40.0, 0.0, -1), &neutrino);

        assert_eq!(analysis.series_counts().get("positive"), Some(&2));
        assert_eq!(analysis.series_counts().get("negative"), Some(&1));
        assert_eq!(analysis.accepted_histogram().entries(), 3);
    }

    #[test]
    fn test_tag_and_probe_counts() {
        let mut analysis =
            CutflowAnalysis::new(ChannelConfig::z(), ClassifierMode::TagAndProbe).unwrap();
        let good = muon(45.6, 0.2, 1);
        let partner = muon(45.6, 0.2 + PI, -1);
        let bad = Particle::new(ParticleFields {
            chi2_per_ndof: 40.0,
            ..*partner.fields()
        });

        analysis.record(&good, &partner);
        analysis.record(&good, &bad);
        assert_eq!(analysis.probe_counts(), (1, 1));

        let readout = analysis.readout();
        assert_eq!(
            readout.tag_and_probe,
            Some(ProbeReadout {
                single_valid: 1,
                double_valid: 1
            })
        );
    }

    #[test]
    fn test_readout_merge_keeps_state_on_bucket_mismatch() {
        let mut readout = run(&mixed_pairs()).readout();
        let before = readout.clone();

        let mut reordered = readout.clone();
        reordered.buckets.swap(0, 1);

        assert!(readout.merge(&reordered).is_err());
        assert_eq!(readout, before);
    }

    #[test]
    fn test_mass_at_window_edge_lands_in_histogram() {
        let a = muon(45.0, 0.2, 1);
        let b = muon(45.0, 0.2 + PI, -1);
        let mass = ChannelConfig::z().reconstruct_mass(&a, &b);

        let config = ChannelConfig {
            min_mass: mass - 10.0,
            max_mass: mass,
            n_bins: 10,
            ..ChannelConfig::z()
        };
        let mut analysis = CutflowAnalysis::new(config, ClassifierMode::Normal).unwrap();
        analysis.record(&a, &b);

        let readout = analysis.readout();
        assert_eq!(readout.accepted, 1);
        assert_eq!(readout.bin_contents.iter().sum::<u64>(), 1);
        assert_eq!(readout.bin_contents[9], 1);
    }

    #[test]
    fn test_run_counts_from_event_tags() {
        let mut analysis = CutflowAnalysis::new(ChannelConfig::z(), ClassifierMode::Normal).unwrap();
        let tagged = |run| {
            Particle::with_tag(
                *muon(45.6, 0.2, 1).fields(),
                EventTag {
                    run,
                    ..Default::default()
                },
            )
        };
        let partner = muon(45.6, 0.2 + PI, -1);

        analysis.record(&tagged(163_255), &partner);
        analysis.record(&tagged(163_255), &partner);
        analysis.record(&tagged(146_644), &partner);
        analysis.record(&muon(45.6, 0.2, 1), &partner);

        let runs = analysis.run_counts();
        assert_eq!(runs.get(&163_255), Some(&2));
        assert_eq!(runs.get(&146_644), Some(&1));
        assert_eq!(runs.values().sum::<u64>(), 3);

        let mut readout = analysis.readout();
        readout.merge(&analysis.readout()).unwrap();
        assert_eq!(readout.runs.get(&163_255), Some(&4));
    }
}
