//! 事例流处理模块
//!
//! 记录解析、粒子对配对、分析状态驱动与进度统计。
//! 单个事例流始终在一个线程内顺序处理；跨文件并行由 tools 层负责。

pub mod analysis;
pub mod event_stream;
pub mod progress;
pub mod record_parser;

// 重新导出公共接口
pub use analysis::{AnalysisReadout, BucketReadout, CutflowAnalysis, ProbeReadout};
pub use event_stream::{EventPair, EventStream, count_records};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use record_parser::RecordParser;
