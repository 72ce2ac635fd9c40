//! 批量处理集成测试
//!
//! 验证目录扫描、串行与并行批处理结果一致、失败文件隔离，以及批量报告写出。


use dimuon_cutflow::core::Bucket;
use dimuon_cutflow::error::ErrorCategory;
use dimuon_cutflow::tools::{self, AppConfig, ExportDocument};
use event_fixtures::{
    BATCH_A_PAIRS, BATCH_B_PAIRS, BATCH_BROKEN, PairKind, batch_dir, count_kind,
    ensure_fixtures_generated, reports_dir,
};
use std::path::PathBuf;

fn log(msg_zh: impl AsRef<str>, msg_en: impl AsRef<str>) {
    println!("{} / {}", msg_zh.as_ref(), msg_en.as_ref());
}

fn batch_config() -> AppConfig {
    ensure_fixtures_generated();
    AppConfig::for_input(batch_dir())
}

fn batch_files() -> Vec<PathBuf> {
    tools::scan_event_files(&batch_dir()).unwrap()
}

fn total_pairs() -> u64 {
    (BATCH_A_PAIRS.len() + BATCH_B_PAIRS.len()) as u64
}

#[test]
fn test_batch_mode_detection() {
    let config = batch_config();
    assert!(config.is_batch_mode(), "目录路径应该被识别为批量模式");
}

/// 扫描只返回事例日志，按文件名排序
#[test]
fn test_scan_finds_event_logs_sorted() {
    let files = batch_config();
    let files = tools::scan_event_files(&files.input_path).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(names, vec!["z_run_a.csv", "z_run_b.csv", BATCH_BROKEN]);
}

/// 串行批处理：成功文件合并，奇数记录文件计入结构错误
#[test]
fn test_serial_batch_isolates_failure() {
    let config = batch_config();
    let outcome = tools::process_batch_serial(&batch_files(), &config).unwrap();

    assert_eq!(outcome.stats.processed, 2);
    assert_eq!(outcome.stats.failed, 1);
    assert_eq!(outcome.stats.pairs, total_pairs());
    assert_eq!(
        outcome.stats.error_stats.get(&ErrorCategory::Structure),
        Some(&vec![BATCH_BROKEN.to_string()])
    );

    let merged = outcome.merged.as_ref().unwrap();
    assert_eq!(merged.pairs(), total_pairs());

    let expected_accepted = count_kind(BATCH_A_PAIRS, PairKind::Accepted)
        + count_kind(BATCH_B_PAIRS, PairKind::Accepted);
    assert_eq!(merged.accepted_count(), expected_accepted);
    assert_eq!(
        merged.bucket_count(Bucket::SameJet),
        count_kind(BATCH_A_PAIRS, PairKind::SameJet) + count_kind(BATCH_B_PAIRS, PairKind::SameJet)
    );

    // 每个成功文件保留自己的读出，顺序与输入一致
    assert_eq!(outcome.files.len(), 2);
    assert_eq!(outcome.files[0].readout.pairs, BATCH_A_PAIRS.len() as u64);
    assert_eq!(outcome.files[1].readout.pairs, BATCH_B_PAIRS.len() as u64);

    log("  ✓ 串行批处理隔离失败文件", "  ✓ Serial batch isolates failures");
}

/// 并行批处理与串行结果完全一致
#[test]
fn test_parallel_matches_serial() {
    let config = batch_config();
    let files = batch_files();

    let serial = tools::process_batch_serial(&files, &config).unwrap();
    let parallel = tools::process_batch_parallel(&files, &config, 3).unwrap();

    assert_eq!(parallel.stats.processed, serial.stats.processed);
    assert_eq!(parallel.stats.failed, serial.stats.failed);
    assert_eq!(parallel.stats.error_stats, serial.stats.error_stats);

    let serial_paths: Vec<_> = serial.files.iter().map(|f| f.path.clone()).collect();
    let parallel_paths: Vec<_> = parallel.files.iter().map(|f| f.path.clone()).collect();
    assert_eq!(parallel_paths, serial_paths);

    assert_eq!(
        parallel.merged.as_ref().unwrap().readout(),
        serial.merged.as_ref().unwrap().readout()
    );

    log("  ✓ 并行与串行结果一致", "  ✓ Parallel matches serial");
}

/// 批量报告：每个文件一行、失败文件标注、合并读出与JSON导出
#[test]
fn test_batch_report_written() {
    let reports = reports_dir();
    let report_path = reports.join("batch_summary.txt");
    let json_path = reports.join("batch_export.json");

    let config = AppConfig {
        output_path: Some(report_path.clone()),
        json_path: Some(json_path.clone()),
        ..batch_config()
    };
    let files = batch_files();
    let outcome = tools::process_batch_serial(&files, &config).unwrap();

    let written = tools::finalize_and_write_batch_output(&config, &files, &outcome).unwrap();
    assert_eq!(written, report_path);

    let report = std::fs::read_to_string(&report_path).unwrap();
    assert!(report.contains("z_run_a.csv"));
    assert!(report.contains("z_run_b.csv"));
    assert!(report.contains(&format!("{BATCH_BROKEN}\t-\t-\t-\t[FAILED]")));

    let document: ExportDocument =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(document.sources.len(), 2);
    assert_eq!(document.readout.pairs, total_pairs());

    // 两个单文件导出的读出合并后与批量合并一致
    let mut summed = outcome.files[0].readout.clone();
    summed.merge(&outcome.files[1].readout).unwrap();
    assert_eq!(summed.pairs, document.readout.pairs);
    assert_eq!(summed.bin_contents, document.readout.bin_contents);
    assert_eq!(summed.spectrum_contents, document.readout.spectrum_contents);
}

/// 空目录：不产生任何结果
#[test]
fn test_empty_directory() {
    let empty = reports_dir().join("empty_dir");
    std::fs::create_dir_all(&empty).unwrap();

    let files = tools::scan_event_files(&empty).unwrap();
    assert!(files.is_empty());

    let outcome = tools::process_batch_serial(&files, &AppConfig::for_input(&empty)).unwrap();
    assert!(outcome.merged.is_none());
    assert_eq!(outcome.stats.total(), 0);
}
