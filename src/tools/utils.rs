//! 工具函数模块
//!
//! 提供文件路径处理和并发度计算等通用工具函数。

use super::constants::parallel_limits::{MAX_PARALLEL_DEGREE, MIN_PARALLEL_DEGREE};

/// 文件路径处理工具函数
pub mod path {
    use std::path::Path;

    /// 提取文件名（返回String，用于日志显示）
    #[inline]
    pub fn extract_filename_lossy(path: &Path) -> String {
        path.file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// 提取文件stem（不含扩展名）
    #[inline]
    pub fn extract_file_stem_string(path: &Path) -> String {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("events")
            .to_string()
    }

    /// 获取父目录，如果不存在则返回当前目录
    #[inline]
    pub fn get_parent_dir(path: &Path) -> &Path {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// 扩展名是否在支持列表中（大小写不敏感）
    pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

/// 计算实际并发度
///
/// 请求值限制在 [1, 16] 内，且不超过待处理文件数。
pub fn effective_parallel_degree(requested: usize, file_count: Option<usize>) -> usize {
    let clamped = requested.clamp(MIN_PARALLEL_DEGREE, MAX_PARALLEL_DEGREE);
    match file_count {
        Some(count) => clamped.min(count.max(MIN_PARALLEL_DEGREE)),
        None => clamped,
    }
}

// 重新导出为平级函数
pub use path::{extract_file_stem_string, extract_filename_lossy, get_parent_dir, has_extension};
