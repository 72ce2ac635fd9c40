//! 文件扫描模块
//!
//! 负责扫描目录中的事例日志文件，以及批量汇总报告的生成与写出。

use super::batch_state::BatchStatsSnapshot;
use super::cli::AppConfig;
use super::constants::input::SUPPORTED_EXTENSIONS;
use super::constants::output::{BATCH_REPORT_SUFFIX, REPORT_SUFFIX, TIMESTAMP_FORMAT};
use super::formatter::{self, ExportDocument};
use super::processor::BatchOutcome;
use super::utils;
use crate::error::{AnalysisError, AnalysisResult};
use std::path::{Path, PathBuf};

/// 扫描目录中的事例日志（不递归子目录，按文件名排序）
///
/// 本工具自己写出的报告文件会被跳过。
pub fn scan_event_files(dir_path: &Path) -> AnalysisResult<Vec<PathBuf>> {
    if !dir_path.exists() {
        return Err(AnalysisError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("目录不存在: {}", dir_path.display()),
        )));
    }

    if !dir_path.is_dir() {
        return Err(AnalysisError::InvalidInput(format!(
            "路径不是目录: {}",
            dir_path.display()
        )));
    }

    let mut event_files = Vec::new();
    for entry in std::fs::read_dir(dir_path)? {
        let path = entry?.path();
        if path.is_file()
            && utils::has_extension(&path, SUPPORTED_EXTENSIONS)
            && !is_generated_report(&path)
        {
            event_files.push(path);
        }
    }

    event_files.sort();
    Ok(event_files)
}

fn is_generated_report(path: &Path) -> bool {
    let name = utils::extract_filename_lossy(path);
    name.ends_with(REPORT_SUFFIX) || name.contains(BATCH_REPORT_SUFFIX)
}

/// 显示文件扫描结果
pub fn show_scan_results(config: &AppConfig, event_files: &[PathBuf]) {
    if event_files.is_empty() {
        println!(
            "[WARNING] 在目录 {} 中没有找到事例日志 / No event logs found",
            config.input_path.display()
        );
        println!(
            "   支持的扩展名 / Supported extensions: {}",
            SUPPORTED_EXTENSIONS.join(", ")
        );
        return;
    }

    println!("[INFO] 扫描目录 / Scanning: {}", config.input_path.display());
    println!(
        "[INFO] 找到 {} 个事例日志 / event logs found",
        event_files.len()
    );

    if config.verbose {
        for (i, file) in event_files.iter().enumerate() {
            println!("   {}. {}", i + 1, utils::extract_filename_lossy(file));
        }
    }
    println!();
}

/// 生成批量输出的头部信息
pub fn create_batch_output_header(config: &AppConfig, event_files: &[PathBuf]) -> String {
    let mut output = String::new();

    output.push_str("=====================================\n");
    output.push_str("   Dimuon Cut-flow Batch Report\n");
    output.push_str("   批量分析结果\n");
    output.push_str("=====================================\n\n");

    output.push_str(&format!(
        "通道 / Channel: {} ({})\n",
        config.channel.name,
        config.mode.display_name()
    ));
    output.push_str(&format!("扫描目录 / Directory: {}\n", config.input_path.display()));
    output.push_str(&format!("文件数 / Files: {}\n\n", event_files.len()));

    output.push_str("文件名\tPairs\tAccepted\tRate\tTop cut\n");
    output.push_str("--------------------------------------------------------\n");

    output
}

/// 生成批量输出文件路径
pub fn generate_batch_output_path(config: &AppConfig) -> PathBuf {
    config.output_path.clone().unwrap_or_else(|| {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let base_name = utils::extract_filename_lossy(&config.input_path).replace('.', "_");
        let base_name = if base_name.is_empty() {
            "events".to_string()
        } else {
            base_name
        };
        config
            .input_path
            .join(format!("{base_name}{BATCH_REPORT_SUFFIX}_{timestamp}.txt"))
    })
}

/// 组装批量报告并写出（合并读出、可选JSON导出）
///
/// 返回写出的报告路径。
pub fn finalize_and_write_batch_output(
    config: &AppConfig,
    event_files: &[PathBuf],
    outcome: &BatchOutcome,
) -> AnalysisResult<PathBuf> {
    let mut output = create_batch_output_header(config, event_files);

    for file in &outcome.files {
        let name = utils::extract_filename_lossy(&file.path);
        output.push_str(&formatter::format_file_row(&name, &file.readout));
    }
    for files in outcome.stats.error_stats.values() {
        for name in files {
            output.push_str(&format!("{name}\t-\t-\t-\t[FAILED]\n"));
        }
    }
    output.push('\n');

    if let Some(merged) = &outcome.merged {
        let readout = merged.readout();
        let source = format!("{} ({} files)", config.input_path.display(), outcome.files.len());
        output.push_str(&formatter::format_report(&source, &readout));

        if let Some(json_path) = &config.json_path {
            let sources: Vec<PathBuf> = outcome.files.iter().map(|f| f.path.clone()).collect();
            formatter::write_json_export(json_path, &ExportDocument::new(readout, &sources))?;
        }
    }

    output.push('\n');
    output.push_str(&outcome.stats.format_footer());
    output.push_str(&format!(
        "\n生成时间 / Generated: {}\n",
        chrono::Local::now().format(TIMESTAMP_FORMAT)
    ));

    let output_path = generate_batch_output_path(config);
    std::fs::write(&output_path, &output)?;
    Ok(output_path)
}

/// 显示批量处理完成信息
pub fn show_batch_completion_info(output_path: &Path, stats: &BatchStatsSnapshot) {
    println!();
    println!("[INFO] 批量处理完成 / Batch finished");
    println!(
        "   成功处理 / Processed: {} / {} 个文件",
        stats.processed,
        stats.total()
    );
    if stats.failed > 0 {
        println!("   失败文件 / Failed: {} 个", stats.failed);
    }
    println!("   批量汇总 / Report: {}", output_path.display());
}
