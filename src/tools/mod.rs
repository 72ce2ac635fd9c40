//! 工具模块集合
//!
//! 包含CLI、文件处理、格式化等工具模块，支持main.rs的流程控制。

pub mod batch_state;
pub mod cli;
pub mod constants;
pub mod formatter;
pub mod parallel_processor;
pub mod processor;
pub mod scanner;
pub mod utils;

// 重新导出主要的公共接口
pub use batch_state::{BatchStatsSnapshot, ParallelBatchStats, SerialBatchStats};
pub use cli::{AppConfig, parse_args, show_completion_info, show_startup_info};
pub use formatter::{ExportDocument, format_report, write_json_export, write_output};
pub use parallel_processor::process_batch_parallel;
pub use processor::{
    BatchOutcome, FileSummary, output_results, process_batch_serial, process_event_file,
    process_event_stream,
};
pub use scanner::{
    finalize_and_write_batch_output, scan_event_files, show_batch_completion_info,
    show_scan_results,
};
