//! 命令行接口模块
//!
//! 负责命令行参数解析、通道配置装配和程序信息展示。

use super::constants::{defaults, parallel_limits};
use crate::core::channel::{ChannelConfig, Delimiter, PRESET_NAMES};
use crate::core::classifier::ClassifierMode;
use crate::error::{AnalysisError, AnalysisResult};
use clap::{Arg, ArgMatches, Command};
use std::path::{Path, PathBuf};

/// 应用程序版本信息
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// 应用程序配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 事例日志文件（单文件模式）或扫描目录（批量模式）
    pub input_path: PathBuf,

    /// 是否显示详细信息（含逐百分比进度）
    pub verbose: bool,

    /// 文本报告输出路径（批量模式未指定时自动生成）
    pub output_path: Option<PathBuf>,

    /// JSON读出导出路径
    pub json_path: Option<PathBuf>,

    /// 完整的通道截断配置
    pub channel: ChannelConfig,

    pub mode: ClassifierMode,

    /// 多文件并行度（None 表示串行）
    pub parallel_files: Option<usize>,
}

impl AppConfig {
    /// 为单个输入构造默认配置（Z通道、正常模式、默认并行度）
    pub fn for_input(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            verbose: false,
            output_path: None,
            json_path: None,
            channel: ChannelConfig::z(),
            mode: ClassifierMode::Normal,
            parallel_files: Some(defaults::PARALLEL_FILES_DEGREE),
        }
    }

    /// 智能判断是否为批量模式（基于路径类型）
    #[inline]
    pub fn is_batch_mode(&self) -> bool {
        self.input_path.is_dir()
    }
}

/// 构建命令行定义
pub fn build_command() -> Command {
    Command::new("dimuon-cutflow")
        .version(VERSION)
        .about(DESCRIPTION)
        .arg(
            Arg::new("INPUT")
                .help("事例日志文件或目录 / Event log file or directory (txt, csv, dat)")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("channel")
                .long("channel")
                .short('c')
                .help("通道预设 / Channel preset")
                .value_parser(PRESET_NAMES.to_vec())
                .default_value(defaults::CHANNEL_PRESET),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("从JSON文件加载通道配置（覆盖 --channel） / Load channel config from JSON")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("tag-and-probe")
                .long("tag-and-probe")
                .short('t')
                .help("标签-探针模式：一个粒子失效时仍保留粒子对 / Tag-and-probe mode")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("delimiter")
                .long("delimiter")
                .short('d')
                .help("覆盖记录字段分隔符 / Override record delimiter")
                .value_parser(["comma", "space"]),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("输出文本报告到文件 / Write text report to file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("导出JSON读出 / Export JSON readout")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("显示详细处理信息 / Show detailed progress")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("parallel-files")
                .long("parallel-files")
                .short('j')
                .help("批量模式的文件并行度 / Files processed in parallel (1-16)")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .default_value("4"),
        )
        .arg(
            Arg::new("serial")
                .long("serial")
                .help("批量模式串行处理 / Process batch files serially")
                .action(clap::ArgAction::SetTrue),
        )
}

/// 解析命令行参数并创建配置
pub fn parse_args() -> AnalysisResult<AppConfig> {
    config_from_matches(&build_command().get_matches())
}

/// 从解析结果装配配置（JSON配置优先于预设，分隔符覆盖最后生效）
pub fn config_from_matches(matches: &ArgMatches) -> AnalysisResult<AppConfig> {
    let input_path = matches
        .get_one::<String>("INPUT")
        .map(PathBuf::from)
        .ok_or_else(|| AnalysisError::InvalidInput("缺少输入路径".to_string()))?;

    let mut channel = match matches.get_one::<String>("config") {
        Some(path) => ChannelConfig::from_json_file(Path::new(path))?,
        None => {
            let preset = matches
                .get_one::<String>("channel")
                .map(String::as_str)
                .unwrap_or(defaults::CHANNEL_PRESET);
            ChannelConfig::from_preset(preset)?
        }
    };

    if let Some(delimiter) = matches.get_one::<String>("delimiter") {
        channel.delimiter = match delimiter.as_str() {
            "space" => Delimiter::Whitespace,
            _ => Delimiter::Comma,
        };
    }

    let mode = if matches.get_flag("tag-and-probe") {
        ClassifierMode::TagAndProbe
    } else {
        ClassifierMode::Normal
    };

    let parallel_files = if matches.get_flag("serial") {
        None
    } else {
        let requested = matches
            .get_one::<usize>("parallel-files")
            .copied()
            .unwrap_or(defaults::PARALLEL_FILES_DEGREE);
        Some(requested.clamp(
            parallel_limits::MIN_PARALLEL_DEGREE,
            parallel_limits::MAX_PARALLEL_DEGREE,
        ))
    };

    Ok(AppConfig {
        input_path,
        verbose: matches.get_flag("verbose"),
        output_path: matches.get_one::<String>("output").map(PathBuf::from),
        json_path: matches.get_one::<String>("json").map(PathBuf::from),
        channel,
        mode,
        parallel_files,
    })
}

/// 显示程序启动信息
pub fn show_startup_info(config: &AppConfig) {
    println!("dimuon-cutflow v{VERSION}");
    println!("{DESCRIPTION}");
    println!(
        "[INFO] 通道 / Channel: {} ({}), 质量窗口 / Mass window: [{}, {}] GeV, {} bins",
        config.channel.name,
        config.mode.display_name(),
        config.channel.min_mass,
        config.channel.max_mass,
        config.channel.n_bins
    );
    println!();
}

/// 显示程序完成信息
pub fn show_completion_info(config: &AppConfig) {
    if config.verbose {
        println!("[INFO] 所有任务处理完成 / All tasks completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::AngleField;

    fn parse(args: &[&str]) -> AnalysisResult<AppConfig> {
        let mut full = vec!["dimuon-cutflow"];
        full.extend_from_slice(args);
        let matches = build_command()
            .try_get_matches_from(full)
            .map_err(|e| AnalysisError::InvalidInput(e.to_string()))?;
        config_from_matches(&matches)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["events.csv"]).unwrap();
        assert_eq!(config.input_path, PathBuf::from("events.csv"));
        assert_eq!(config.channel, ChannelConfig::z());
        assert_eq!(config.mode, ClassifierMode::Normal);
        assert_eq!(config.parallel_files, Some(4));
        assert!(!config.verbose);
        assert!(config.json_path.is_none());
    }

    #[test]
    fn test_channel_and_mode() {
        let config = parse(&["mc.txt", "--channel", "z-mc", "--tag-and-probe"]).unwrap();
        assert_eq!(config.channel.angle_field, AngleField::Eta);
        assert_eq!(config.channel.delimiter, Delimiter::Whitespace);
        assert_eq!(config.mode, ClassifierMode::TagAndProbe);
    }

    #[test]
    fn test_delimiter_override() {
        let config = parse(&["mc.txt", "--channel", "z-mc", "--delimiter", "comma"]).unwrap();
        assert_eq!(config.channel.delimiter, Delimiter::Comma);
    }

    #[test]
    fn test_parallel_flags() {
        assert_eq!(parse(&["d", "--serial"]).unwrap().parallel_files, None);
        assert_eq!(
            parse(&["d", "--parallel-files", "99"]).unwrap().parallel_files,
            Some(16)
        );
        assert_eq!(
            parse(&["d", "--parallel-files", "0"]).unwrap().parallel_files,
            Some(1)
        );
    }

    #[test]
    fn test_unknown_channel_rejected() {
        assert!(parse(&["events.csv", "--channel", "upsilon"]).is_err());
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let err = parse(&["events.csv", "--config", "/nonexistent/channel.json"]).unwrap_err();
        assert!(matches!(err, AnalysisError::IoError(_)));
    }
}
