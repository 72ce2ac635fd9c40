//! 多文件并行处理模块
//!
//! 使用rayon实现文件级并行：每个文件是一个独立的事例流，
//! 在单个工作线程内顺序处理；结果按输入顺序合并，与串行模式完全一致。

use super::batch_state::ParallelBatchStats;
use super::cli::AppConfig;
use super::processor::{BatchOutcome, process_event_file, report_failure};
use super::utils;
use crate::error::{AnalysisError, AnalysisResult};
use crate::processing::CutflowAnalysis;
use rayon::prelude::*;
use std::path::PathBuf;

/// 有序结果容器（保证合并顺序）
struct OrderedResult {
    /// 原始文件索引（用于排序）
    index: usize,

    file_path: PathBuf,

    result: AnalysisResult<CutflowAnalysis>,
}

/// 多文件并行处理
///
/// - 自定义rayon线程池精确控制并发度
/// - 单个文件失败只计入统计，不影响其他文件
/// - 按原始索引排序后依次合并
pub fn process_batch_parallel(
    event_files: &[PathBuf],
    config: &AppConfig,
    parallel_degree: usize,
) -> AnalysisResult<BatchOutcome> {
    println!("[INFO] 启用多文件并行处理 / Parallel file processing: {parallel_degree} 并发度");

    let stats = ParallelBatchStats::new();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(parallel_degree)
        .thread_name(|i| format!("cutflow-worker-{i}"))
        .build()
        .map_err(|e| AnalysisError::ResourceError(format!("线程池创建失败: {e}")))?;

    // 工作线程内不打印逐百分比进度，避免输出交错
    let silent_config = AppConfig {
        verbose: false,
        ..config.clone()
    };

    let mut results: Vec<OrderedResult> = pool.install(|| {
        event_files
            .par_iter()
            .enumerate()
            .map(|(index, path)| {
                let result = process_event_file(path, &silent_config);
                let filename = utils::extract_filename_lossy(path);

                match &result {
                    Ok(analysis) => {
                        let count = stats.record_success(analysis.pairs());
                        if config.verbose {
                            println!("[OK] [{count}/{}] {filename}", event_files.len());
                        }
                    }
                    Err(e) => {
                        let category = stats.record_failure(filename.clone(), e);
                        report_failure(index, event_files.len(), &filename, e, category, config.verbose);
                    }
                }

                OrderedResult {
                    index,
                    file_path: path.clone(),
                    result,
                }
            })
            .collect()
    });

    results.sort_by_key(|r| r.index);

    let mut outcome = BatchOutcome::default();
    for ordered in results {
        if let Ok(analysis) = ordered.result {
            outcome.push(ordered.file_path, analysis)?;
        }
    }
    outcome.stats = stats.snapshot();
    Ok(outcome)
}
