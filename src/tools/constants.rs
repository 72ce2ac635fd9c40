//! 常量和默认配置集中管理
//!
//! 将所有重要常量集中定义，避免"默认值漂移"和重复定义

/// 默认配置值
pub mod defaults {
    /// 默认通道预设
    pub const CHANNEL_PRESET: &str = "z";

    /// 默认多文件并行并发度
    ///
    /// 每个文件是一个独立的事例流，4并发度在多数场景下
    /// 提供良好的性能/资源平衡
    pub const PARALLEL_FILES_DEGREE: usize = 4;
}

/// 并发度限制常量
pub mod parallel_limits {
    /// 最小并发度
    pub const MIN_PARALLEL_DEGREE: usize = 1;

    /// 最大并发度
    ///
    /// 限制最大并发度为16，避免过多的上下文切换和内存占用
    pub const MAX_PARALLEL_DEGREE: usize = 16;
}

/// 输入文件
pub mod input {
    /// 批量模式扫描的事例日志扩展名
    pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "csv", "dat"];
}

/// 输出文件命名
pub mod output {
    /// 单文件文本报告后缀
    pub const REPORT_SUFFIX: &str = "_Cutflow_Report.txt";

    /// 批量汇总报告后缀
    pub const BATCH_REPORT_SUFFIX: &str = "_Cutflow_Batch";

    /// 报告中时间戳格式
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
}
