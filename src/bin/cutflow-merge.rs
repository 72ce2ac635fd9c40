//! cutflow-merge - 合并多次运行导出的截断流读出
//!
//! 扫描目录（或单个文件）下由 `dimuon-cutflow --json` 生成的导出文件，
//! 对同一通道、同一分bin的读出逐元素求和，打印截断流汇总表，可选写出合并后的JSON。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use dimuon_cutflow::tools::ExportDocument;
use walkdir::WalkDir;

// 导出文件扩展名
const EXPORT_EXTENSION: &str = "json";

#[derive(Parser)]
#[command(name = "cutflow-merge")]
#[command(about = "合并截断流导出文件 / Merge cut-flow JSON exports")]
#[command(version)]
struct Cli {
    /// 导出文件或包含导出文件的目录
    /// Export files or directories containing them
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// 合并结果写出路径（JSON）
    /// Write the merged export to this path
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// 目录扫描的最大深度（默认不限）
    /// Maximum directory depth (unlimited by default)
    #[arg(long)]
    max_depth: Option<usize>,
}

/// 收集所有导出文件（排序后返回，保证合并顺序稳定）
fn collect_exports(inputs: &[PathBuf], max_depth: Option<usize>) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
            continue;
        }

        let mut walker = WalkDir::new(input);
        if let Some(depth) = max_depth {
            walker = walker.max_depth(depth);
        }
        files.extend(
            walker
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| {
                    e.path()
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .map(|ext| ext.eq_ignore_ascii_case(EXPORT_EXTENSION))
                        .unwrap_or(false)
                })
                .map(|e| e.into_path()),
        );
    }
    files.sort();
    files.dedup();
    files
}

fn load_export(path: &Path) -> Result<ExportDocument> {
    let text =
        fs::read_to_string(path).with_context(|| format!("无法读取 / Cannot read {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("不是有效的截断流导出 / Not a cut-flow export: {}", path.display()))
}

/// 打印合并后的截断流汇总表
fn print_summary(merged: &ExportDocument) {
    let readout = &merged.readout;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Cut / 截断", "Rejected / 拒绝", "Fraction / 占比"]);

    let fraction = |count: u64| {
        if readout.pairs == 0 {
            0.0
        } else {
            count as f64 * 100.0 / readout.pairs as f64
        }
    };

    for bucket in &readout.buckets {
        table.add_row(vec![
            Cell::new(&bucket.title),
            Cell::new(bucket.count).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}%", fraction(bucket.count))).set_alignment(CellAlignment::Right),
        ]);
    }
    table.add_row(vec![
        Cell::new("Accepted / 接受"),
        Cell::new(readout.accepted).set_alignment(CellAlignment::Right),
        Cell::new(format!("{:.2}%", readout.acceptance_percent()))
            .set_alignment(CellAlignment::Right),
    ]);

    println!(
        "Channel / 通道: {}  Mode / 模式: {}  Pairs / 粒子对: {}",
        readout.channel,
        readout.mode.display_name(),
        readout.pairs
    );
    println!("{table}");

    for (key, count) in &readout.series_counts {
        println!("  系列 / Series {key}: {count}");
    }
    if let Some(probes) = readout.tag_and_probe {
        println!(
            "  单粒子有效 / Single valid: {}  双粒子有效 / Double valid: {}",
            probes.single_valid, probes.double_valid
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let files = collect_exports(&cli.inputs, cli.max_depth);
    if files.is_empty() {
        bail!("未找到导出文件 / No export files found");
    }
    eprintln!("[INFO] 找到 {} 个导出文件 / Found {} export files", files.len(), files.len());

    let mut merged: Option<ExportDocument> = None;
    for path in &files {
        let document = load_export(path)?;
        match merged.as_mut() {
            None => merged = Some(document),
            Some(acc) => {
                acc.readout
                    .merge(&document.readout)
                    .with_context(|| format!("合并失败 / Merge failed: {}", path.display()))?;
                acc.sources.extend(document.sources);
            }
        }
    }

    let mut merged = merged.context("未找到导出文件 / No export files found")?;
    merged.generated_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    merged.tool_version = env!("CARGO_PKG_VERSION").to_string();

    print_summary(&merged);

    if let Some(output) = &cli.output {
        let json = serde_json::to_string_pretty(&merged).context("序列化失败 / Serialization failed")?;
        fs::write(output, json)
            .with_context(|| format!("无法写入 / Cannot write {}", output.display()))?;
        eprintln!("[OK] 合并结果已保存 / Merged export saved: {}", output.display());
    }

    Ok(())
}
