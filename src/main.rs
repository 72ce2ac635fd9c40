//! Dimuon Cut-flow Tool - 主程序入口
//!
//! 纯流程控制器，负责协调各个工具模块完成截断流分析任务。

use dimuon_cutflow::{
    error::{AnalysisError, ErrorCategory},
    tools::{self, AppConfig, BatchOutcome},
};
use std::path::PathBuf;
use std::process;

/// 错误退出码定义
mod exit_codes {
    /// 通用错误（I/O等）
    pub const GENERAL_ERROR: i32 = 1;
    /// 输入错误（参数、记录格式、奇数记录）
    pub const INPUT_ERROR: i32 = 2;
    /// 配置错误
    pub const CONFIG_ERROR: i32 = 3;
    /// 资源/并发错误
    pub const RESOURCE_ERROR: i32 = 5;
}

/// 获取错误建议文本
fn get_error_suggestion(error: &AnalysisError) -> &'static str {
    match error {
        AnalysisError::InvalidInput(_) => {
            "检查命令行参数是否正确，使用 --help 查看完整用法 / Check command-line arguments, use --help to see full usage"
        }
        AnalysisError::ResourceError(_) => {
            "资源不可用，尝试 --serial 串行模式或降低并发度 / Resource unavailable, try --serial or lower --parallel-files"
        }
        _ => match ErrorCategory::from_analysis_error(error) {
            ErrorCategory::Parse => {
                "记录应为3、4或至少10个数值字段，检查 --delimiter 与通道预设 / Records need 3, 4 or 10+ numeric fields; check --delimiter and channel"
            }
            ErrorCategory::Structure => {
                "事例日志必须由成对的记录组成，检查文件是否被截断 / Event log must contain whole pairs; check for truncation"
            }
            ErrorCategory::Io => {
                "检查文件路径是否正确，文件是否存在且可读 / Check that the path exists and is readable"
            }
            ErrorCategory::Config => {
                "检查通道配置（质量范围、bin数、分bin参数） / Check channel configuration"
            }
            ErrorCategory::Other => "请检查输入文件和参数设置 / Please check input and parameters",
        },
    }
}

/// 错误处理和建议
fn handle_error(error: AnalysisError) -> ! {
    eprintln!("[ERROR] 错误 / Error: {error}");
    eprintln!("[INFO] 建议 / Suggestion: {}", get_error_suggestion(&error));

    let exit_code = match &error {
        AnalysisError::InvalidInput(_) => exit_codes::INPUT_ERROR,
        AnalysisError::ResourceError(_) => exit_codes::RESOURCE_ERROR,
        _ => match ErrorCategory::from_analysis_error(&error) {
            ErrorCategory::Parse | ErrorCategory::Structure => exit_codes::INPUT_ERROR,
            ErrorCategory::Config => exit_codes::CONFIG_ERROR,
            ErrorCategory::Io | ErrorCategory::Other => exit_codes::GENERAL_ERROR,
        },
    };

    process::exit(exit_code);
}

/// 批量处理事例日志
fn process_batch_mode(config: &AppConfig) -> Result<(), AnalysisError> {
    let event_files = tools::scan_event_files(&config.input_path)?;
    tools::show_scan_results(config, &event_files);

    if event_files.is_empty() {
        return Ok(());
    }

    let outcome = match config.parallel_files {
        None => tools::process_batch_serial(&event_files, config)?,
        Some(degree) => {
            let actual_degree =
                tools::utils::effective_parallel_degree(degree, Some(event_files.len()));

            if actual_degree == 1 {
                if config.verbose {
                    println!("[INFO] 并发度为1，使用串行模式 / Parallelism=1, using serial mode");
                }
                tools::process_batch_serial(&event_files, config)?
            } else {
                match tools::process_batch_parallel(&event_files, config, actual_degree) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        eprintln!("[WARNING] 并行处理失败 / Parallel processing failed: {e}，回退到串行模式 / fallback to serial");
                        tools::process_batch_serial(&event_files, config)?
                    }
                }
            }
        }
    };

    finish_batch(config, &event_files, outcome)
}

/// 批量收尾：单文件目录直接输出单独报告，多文件写批量汇总
fn finish_batch(
    config: &AppConfig,
    event_files: &[PathBuf],
    outcome: BatchOutcome,
) -> Result<(), AnalysisError> {
    if event_files.len() == 1 {
        if let (Some(merged), Some(file)) = (&outcome.merged, outcome.files.first()) {
            // 报告自动保存在该事例日志旁边
            let file_config = AppConfig {
                input_path: file.path.clone(),
                ..config.clone()
            };
            return tools::output_results(merged, &file.path, &file_config, true);
        }
        println!("[FAIL] 单文件处理失败 / Single file failed");
        return Ok(());
    }

    let output_path = tools::finalize_and_write_batch_output(config, event_files, &outcome)?;
    tools::show_batch_completion_info(&output_path, &outcome.stats);
    Ok(())
}

/// 单文件处理模式
fn process_single_mode(config: &AppConfig) -> Result<(), AnalysisError> {
    let analysis = tools::process_event_file(&config.input_path, config)?;
    tools::output_results(&analysis, &config.input_path, config, false)
}

/// 应用程序主逻辑（便于测试和复用）
fn run() -> Result<(), AnalysisError> {
    let config = tools::parse_args()?;
    tools::show_startup_info(&config);

    if config.is_batch_mode() {
        process_batch_mode(&config)?;
    } else {
        process_single_mode(&config)?;
    }

    tools::show_completion_info(&config);
    Ok(())
}

fn main() {
    if let Err(error) = run() {
        handle_error(error);
    }
}
