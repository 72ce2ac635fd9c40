//! 统一错误处理框架
//!
//! 区分致命的结构性错误（缺失输入、记录数为奇数、配置越界）与
//! 直方图边界上被吸收的可恢复错误（越界填充只计数，不在此处出现）。

use std::fmt;
use std::io;

/// 事例分析相关的统一错误类型
#[derive(Debug)]
pub enum AnalysisError {
    /// 输入验证错误（命令行参数、路径类型等）
    InvalidInput(String),

    /// 文件I/O错误
    IoError(io::Error),

    /// 记录解析错误（字段数不合法、非数值字段）
    ParseError {
        /// 出错记录所在的物理行号（从1开始）
        line: usize,
        message: String,
    },

    /// 事例流结构错误（末尾出现未配对的记录）
    StructureError(String),

    /// 配置错误（通道参数非法、子直方图超过9个）
    ConfigError(String),

    /// 资源访问错误（线程池创建失败等）
    ResourceError(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::InvalidInput(msg) => write!(f, "输入验证失败: {msg}"),
            AnalysisError::IoError(err) => write!(f, "文件I/O错误: {err}"),
            AnalysisError::ParseError { line, message } => {
                write!(f, "记录解析失败 (第{line}行): {message}")
            }
            AnalysisError::StructureError(msg) => write!(f, "事例流结构错误: {msg}"),
            AnalysisError::ConfigError(msg) => write!(f, "配置错误: {msg}"),
            AnalysisError::ResourceError(msg) => write!(f, "资源访问错误: {msg}"),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for AnalysisError {
    fn from(err: io::Error) -> Self {
        AnalysisError::IoError(err)
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::ConfigError(format!("JSON处理失败: {err}"))
    }
}

/// 分析操作的标准Result类型
pub type AnalysisResult<T> = Result<T, AnalysisError>;

// ==================== 错误转换Helper函数 ====================

/// 创建解析错误的helper函数
#[inline]
pub fn parse_error<E: fmt::Display>(line: usize, context: &str, err: E) -> AnalysisError {
    AnalysisError::ParseError {
        line,
        message: format!("{context}: {err}"),
    }
}

/// 创建配置错误的helper函数
#[inline]
pub fn config_error<E: fmt::Display>(context: &str, err: E) -> AnalysisError {
    AnalysisError::ConfigError(format!("{context}: {err}"))
}

// ==================== 错误分类系统 ====================
// 用于批量处理中的错误统计和退出码映射

/// 错误类别枚举（用于批量处理统计）
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ErrorCategory {
    /// 记录格式相关错误（字段数、数值格式）
    Parse,
    /// 事例流结构错误（奇数记录）
    Structure,
    /// I/O相关错误（文件不存在、权限不足等）
    Io,
    /// 配置相关错误
    Config,
    /// 其他未分类错误
    Other,
}

impl ErrorCategory {
    /// 从AnalysisError提取错误类别
    pub fn from_analysis_error(e: &AnalysisError) -> Self {
        match e {
            AnalysisError::ParseError { .. } => Self::Parse,
            AnalysisError::StructureError(_) => Self::Structure,
            AnalysisError::IoError(_) => Self::Io,
            AnalysisError::ConfigError(_) => Self::Config,
            AnalysisError::InvalidInput(_) | AnalysisError::ResourceError(_) => Self::Other,
        }
    }

    /// 获取错误类别的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Parse => "解析错误",
            Self::Structure => "结构错误",
            Self::Io => "I/O错误",
            Self::Config => "配置错误",
            Self::Other => "其他错误",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_contains_line() {
        let err = parse_error(7, "字段数不合法", "got 6");
        let text = err.to_string();
        assert!(text.contains("第7行"));
        assert!(text.contains("got 6"));
        assert_eq!(ErrorCategory::from_analysis_error(&err), ErrorCategory::Parse);
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err: AnalysisError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(ErrorCategory::from_analysis_error(&err), ErrorCategory::Io);
    }

    #[test]
    fn test_category_mapping() {
        let structure = AnalysisError::StructureError("odd".to_string());
        let config = config_error("子直方图", "超过9个");
        let other = AnalysisError::ResourceError("pool".to_string());

        assert_eq!(
            ErrorCategory::from_analysis_error(&structure),
            ErrorCategory::Structure
        );
        assert_eq!(
            ErrorCategory::from_analysis_error(&config),
            ErrorCategory::Config
        );
        assert_eq!(
            ErrorCategory::from_analysis_error(&other),
            ErrorCategory::Other
        );
        assert_eq!(ErrorCategory::Config.display_name(), "配置错误");
    }
}
