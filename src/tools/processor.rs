//! 事例日志处理模块
//!
//! 负责单个事例日志的流式处理、结果输出以及串行批量处理。

use super::batch_state::{BatchStatsSnapshot, SerialBatchStats};
use super::cli::AppConfig;
use super::formatter::{self, ExportDocument};
use super::utils;
use crate::error::{AnalysisError, AnalysisResult, ErrorCategory};
use crate::processing::{
    AnalysisReadout, CutflowAnalysis, EventStream, ProgressSnapshot, ProgressTracker,
    RecordParser, count_records,
};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 批量处理中一个成功文件的读出
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub path: PathBuf,
    pub readout: AnalysisReadout,
}

/// 批量处理结果（成功文件按输入顺序排列）
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// 所有成功文件按顺序合并后的分析状态
    pub merged: Option<CutflowAnalysis>,
    pub files: Vec<FileSummary>,
    pub stats: BatchStatsSnapshot,
}

impl BatchOutcome {
    /// 按顺序并入一个成功文件的分析状态
    pub fn push(&mut self, path: PathBuf, analysis: CutflowAnalysis) -> AnalysisResult<()> {
        self.files.push(FileSummary {
            path,
            readout: analysis.readout(),
        });
        match &mut self.merged {
            Some(merged) => merged.merge(&analysis)?,
            None => self.merged = Some(analysis),
        }
        Ok(())
    }
}

/// 处理单个事例日志
///
/// verbose 模式下先预扫描记录数以驱动进度报告。
pub fn process_event_file(path: &Path, config: &AppConfig) -> AnalysisResult<CutflowAnalysis> {
    if !path.exists() {
        return Err(AnalysisError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("文件不存在: {}", path.display()),
        )));
    }
    if !path.is_file() {
        return Err(AnalysisError::InvalidInput(format!(
            "路径不是文件: {}",
            path.display()
        )));
    }

    let expected = if config.verbose {
        let total = count_records(BufReader::new(File::open(path)?))?;
        println!(
            "[INFO] 预扫描 / Pre-scan: {} 条记录 / records in {}",
            total,
            utils::extract_filename_lossy(path)
        );
        Some(total)
    } else {
        None
    };

    let stream = EventStream::open(path, RecordParser::for_channel(&config.channel))?;
    process_event_stream(stream, config, expected)
}

/// 驱动一个事例流直到结束
///
/// 每个粒子对依次：填全谱 -> 分类 -> 填桶或接受直方图。
/// 第一个解析错误或结构错误立即终止处理。
pub fn process_event_stream<R: BufRead>(
    mut stream: EventStream<R>,
    config: &AppConfig,
    expected_records: Option<usize>,
) -> AnalysisResult<CutflowAnalysis> {
    let mut analysis = CutflowAnalysis::new(config.channel.clone(), config.mode)?;
    // 总数未知时（0）不报告进度，只在结束时汇总
    let mut tracker = ProgressTracker::new(expected_records.unwrap_or(0));

    while let Some(pair) = stream.next() {
        analysis.record_pair(&pair?);

        if let Some(snapshot) = tracker.update(stream.records_read()) {
            show_progress(&snapshot);
        }
    }

    if config.verbose {
        let (elapsed, snapshot) = tracker.finish(stream.records_read());
        println!("{}", format_finish_line(elapsed, &snapshot));
        if analysis.out_of_range_total() > 0 {
            println!(
                "[WARNING] {} 次填充超出直方图范围已丢弃 / out-of-range fills dropped",
                analysis.out_of_range_total()
            );
        }
    }

    Ok(analysis)
}

fn format_finish_line(elapsed: Duration, snapshot: &ProgressSnapshot) -> String {
    format!(
        "[INFO] 解析完成 / Parsing finished: {} 条记录, {:.2} 秒, Avg Rate: {:.3} kHz",
        snapshot.processed,
        elapsed.as_secs_f64(),
        snapshot.average_rate_khz()
    )
}

fn show_progress(snapshot: &ProgressSnapshot) {
    let eta = snapshot
        .eta_secs
        .map(|secs| format!("{secs:.0}s"))
        .unwrap_or_else(|| "?".to_string());
    println!(
        "[PROGRESS] {:.0}% ({}/{}) 当前 / current {:.3} kHz, 平均 / avg {:.3} kHz, 剩余 / ETA {eta}",
        snapshot.percent(),
        snapshot.processed,
        snapshot.total,
        snapshot.current_rate / 1000.0,
        snapshot.average_rate_khz()
    );
}

/// 输出单文件结果：文本报告（控制台或文件）与可选的JSON导出
pub fn output_results(
    analysis: &CutflowAnalysis,
    source: &Path,
    config: &AppConfig,
    auto_save: bool,
) -> AnalysisResult<()> {
    let readout = analysis.readout();
    let report = formatter::format_report(&utils::extract_filename_lossy(source), &readout);
    formatter::write_output(&report, config, auto_save)?;

    if let Some(json_path) = &config.json_path {
        let document = ExportDocument::new(readout, &[source.to_path_buf()]);
        formatter::write_json_export(json_path, &document)?;
    }
    Ok(())
}

/// 串行批量处理：逐个文件处理并按顺序合并，单个文件失败不影响其他文件
pub fn process_batch_serial(
    event_files: &[PathBuf],
    config: &AppConfig,
) -> AnalysisResult<BatchOutcome> {
    let mut stats = SerialBatchStats::new();
    let mut outcome = BatchOutcome::default();

    for (index, path) in event_files.iter().enumerate() {
        let filename = utils::extract_filename_lossy(path);
        if config.verbose {
            println!(
                "[PROCESSING] [{}/{}] 处理 / Processing: {filename}",
                index + 1,
                event_files.len()
            );
        }

        match process_event_file(path, config) {
            Ok(analysis) => {
                stats.record_success(analysis.pairs());
                outcome.push(path.clone(), analysis)?;
                if config.verbose {
                    println!("   [OK] 处理成功 / Processing succeeded");
                }
            }
            Err(e) => {
                let category = stats.record_failure(filename.clone(), &e);
                report_failure(index, event_files.len(), &filename, &e, category, config.verbose);
            }
        }
    }

    outcome.stats = stats.snapshot();
    Ok(outcome)
}

/// 打印单个文件的失败信息
pub(crate) fn report_failure(
    index: usize,
    total: usize,
    filename: &str,
    error: &AnalysisError,
    category: ErrorCategory,
    verbose: bool,
) {
    if verbose {
        println!("   [FAIL] 处理失败 / Processing failed");
        println!("      文件 / File: {filename}");
        println!("      类别 / Category: {}", category.display_name());
        println!("      错误 / Error: {error}");
        if let Some(source) = std::error::Error::source(error) {
            println!("      原因 / Cause: {source}");
        }
    } else {
        println!(
            "[FAIL] [{}/{}] {filename} - [{}] {error} / 处理失败",
            index + 1,
            total,
            category.display_name()
        );
    }
}
