//! 输出格式化模块
//!
//! 负责截断流读出的文本报告与JSON导出。

use super::cli::AppConfig;
use super::constants::output::{REPORT_SUFFIX, TIMESTAMP_FORMAT};
use super::utils;
use crate::core::classifier::Bucket;
use crate::error::AnalysisResult;
use crate::processing::AnalysisReadout;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 应用程序版本信息
const VERSION: &str = env!("CARGO_PKG_VERSION");

const SEPARATOR: &str =
    "--------------------------------------------------------------------------------\n";

/// JSON导出文档（`cutflow-merge` 读取此格式）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub generated_at: String,
    pub tool_version: String,

    /// 参与本次读出的事例日志
    pub sources: Vec<String>,

    pub readout: AnalysisReadout,
}

impl ExportDocument {
    pub fn new(readout: AnalysisReadout, sources: &[PathBuf]) -> Self {
        Self {
            generated_at: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            tool_version: VERSION.to_string(),
            sources: sources.iter().map(|p| p.display().to_string()).collect(),
            readout,
        }
    }
}

/// 报告头部
pub fn create_output_header(source: &str, readout: &AnalysisReadout) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "dimuon-cutflow v{VERSION} / Dimuon cut-flow report\n"
    ));
    let now = chrono::Local::now().format(TIMESTAMP_FORMAT);
    output.push_str(&format!("log date: {now}\n\n"));
    output.push_str(SEPARATOR);
    output.push_str(&format!("Statistics for: {source}\n"));
    output.push_str(&format!(
        "Channel: {} ({})\n",
        readout.channel,
        readout.mode.display_name()
    ));
    output.push_str(&format!(
        "Mass window: [{}, {}] GeV, {} bins\n",
        readout.min_mass, readout.max_mass, readout.n_bins
    ));
    output.push_str(SEPARATOR);
    output.push('\n');

    output
}

/// 计数摘要
pub fn format_summary(readout: &AnalysisReadout) -> String {
    let mut output = String::new();
    output.push_str(&format!("Pairs / 粒子对:        {}\n", readout.pairs));
    output.push_str(&format!(
        "Accepted / 接受:       {} ({:.2}%)\n",
        readout.accepted,
        readout.acceptance_percent()
    ));
    output.push_str(&format!("Rejected / 拒绝:       {}\n", readout.rejected()));

    if readout.series_counts.len() > 1 {
        for (key, count) in &readout.series_counts {
            output.push_str(&format!("  series {key}: {count}\n"));
        }
    }

    if let Some(probes) = &readout.tag_and_probe {
        output.push_str(&format!(
            "Tag-and-probe / 标签-探针: single valid {}, double valid {}\n",
            probes.single_valid, probes.double_valid
        ));
    }

    if !readout.runs.is_empty() {
        let runs: Vec<String> = readout
            .runs
            .iter()
            .map(|(run, count)| format!("{run} ({count})"))
            .collect();
        output.push_str(&format!("Runs / 运行号:         {}\n", runs.join(", ")));
    }

    if readout.out_of_range > 0 {
        output.push_str(&format!(
            "Out of range / 越界填充: {}\n",
            readout.out_of_range
        ));
    }
    output.push('\n');
    output
}

/// 截断流表格（按桶编号排列）
pub fn format_cutflow_table(readout: &AnalysisReadout) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Cut / 截断", "Rejected / 拒绝", "Share / 占比"]);

    for bucket in &readout.buckets {
        let share = if readout.pairs == 0 {
            0.0
        } else {
            bucket.count as f64 * 100.0 / readout.pairs as f64
        };
        table.add_row(vec![
            Cell::new(bucket.bucket.id()),
            Cell::new(&bucket.title),
            Cell::new(bucket.count).set_alignment(CellAlignment::Right),
            Cell::new(format!("{share:.2}%")).set_alignment(CellAlignment::Right),
        ]);
    }
    table.add_row(vec![
        Cell::new(""),
        Cell::new("Accepted / 接受"),
        Cell::new(readout.accepted).set_alignment(CellAlignment::Right),
        Cell::new(format!("{:.2}%", readout.acceptance_percent()))
            .set_alignment(CellAlignment::Right),
    ]);

    format!("{table}\n\n")
}

/// 接受直方图表格：bin范围、计数、泊松误差，多系列时逐列列出
pub fn format_accepted_histogram(readout: &AnalysisReadout) -> String {
    let series_keys: Vec<&String> = if readout.series.len() > 1 {
        readout.series.keys().collect()
    } else {
        Vec::new()
    };

    let mut header = vec![
        "Bin / 区间 (GeV)".to_string(),
        "Count / 计数".to_string(),
        "Error / 误差".to_string(),
    ];
    header.extend(series_keys.iter().map(|k| k.to_string()));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);

    for (i, (&count, &error)) in readout
        .bin_contents
        .iter()
        .zip(&readout.poisson_errors)
        .enumerate()
    {
        let (Some(low), Some(high)) = (readout.bin_edges.get(i), readout.bin_edges.get(i + 1))
        else {
            continue;
        };
        let mut row = vec![
            Cell::new(format!("{low:.3} - {high:.3}")),
            Cell::new(count).set_alignment(CellAlignment::Right),
            Cell::new(format!("{error:.2}")).set_alignment(CellAlignment::Right),
        ];
        for key in &series_keys {
            let value = readout
                .series
                .get(*key)
                .and_then(|counts| counts.get(i))
                .copied()
                .unwrap_or(0);
            row.push(Cell::new(value).set_alignment(CellAlignment::Right));
        }
        table.add_row(row);
    }

    format!("{table}\n")
}

/// 完整文本报告
pub fn format_report(source: &str, readout: &AnalysisReadout) -> String {
    let mut output = create_output_header(source, readout);
    output.push_str(&format_summary(readout));
    output.push_str(&format_cutflow_table(readout));
    output.push_str(&format_accepted_histogram(readout));
    output.push_str(SEPARATOR);
    output
}

/// 单行截断流摘要（批量报告逐文件列出）
pub fn format_file_row(name: &str, readout: &AnalysisReadout) -> String {
    let top = Bucket::ALL
        .into_iter()
        .zip(&readout.buckets)
        .max_by_key(|(_, b)| b.count)
        .filter(|(_, b)| b.count > 0)
        .map(|(bucket, _)| bucket.key())
        .unwrap_or("-");
    format!(
        "{name}\t{}\t{}\t{:.2}%\t{top}\n",
        readout.pairs,
        readout.accepted,
        readout.acceptance_percent()
    )
}

/// 写出JSON导出文档
pub fn write_json_export(path: &Path, document: &ExportDocument) -> AnalysisResult<()> {
    let json = serde_json::to_string_pretty(document)?;
    std::fs::write(path, json)?;
    println!("[INFO] JSON读出已保存 / JSON readout saved: {}", path.display());
    Ok(())
}

/// 输出报告：指定路径时写文件，否则自动保存到输入文件旁或打印到控制台
pub fn write_output(output: &str, config: &AppConfig, auto_save: bool) -> AnalysisResult<()> {
    match &config.output_path {
        Some(output_path) => {
            std::fs::write(output_path, output)?;
            println!("[INFO] 结果已保存到 / Saved to: {}", output_path.display());
        }
        None => {
            if auto_save {
                let parent_dir = utils::get_parent_dir(&config.input_path);
                let file_stem = utils::extract_file_stem_string(&config.input_path);
                let auto_output_path = parent_dir.join(format!("{file_stem}{REPORT_SUFFIX}"));
                std::fs::write(&auto_output_path, output)?;
                println!(
                    "[INFO] 结果已保存到 / Saved to: {}",
                    auto_output_path.display()
                );
            } else {
                print!("{output}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::ChannelConfig;
    use crate::core::classifier::ClassifierMode;
    use crate::core::particle::Particle;
    use crate::processing::CutflowAnalysis;

    fn sample_readout() -> AnalysisReadout {
        let mut analysis = CutflowAnalysis::new(ChannelConfig::w(), ClassifierMode::Normal).unwrap();
        let neutrino = Particle::massless(40.0, std::f64::consts::PI, 0.0);
        let muon = |charge| {
            Particle::new(crate::core::particle::ParticleFields {
                pt: 40.0,
                theta: 1.2,
                charge,
                chambers: 15,
                pixel_hits: 2,
                strip_hits: 10,
                chi2_per_ndof: 0.9,
                isolation: 0.5,
                ..Default::default()
            })
        };
        analysis.record(&muon(1), &neutrino);
        analysis.record(&muon(-1), &neutrino);
        // 软中微子背靠背，越过同喷注截断后才被动量截断拒绝
        analysis.record(&muon(1), &Particle::massless(5.0, std::f64::consts::PI, 0.0));
        analysis.readout()
    }

    #[test]
    fn test_report_sections() {
        let readout = sample_readout();
        let report = format_report("W.csv", &readout);

        assert!(report.contains("Statistics for: W.csv"));
        assert!(report.contains("Channel: W (normal)"));
        assert!(report.contains("series positive: 1"));
        assert!(report.contains("series negative: 1"));
        assert!(report.contains(Bucket::Momentum.title()));
    }

    #[test]
    fn test_file_row_names_dominant_cut() {
        let readout = sample_readout();
        let row = format_file_row("W.csv", &readout);
        assert!(row.starts_with("W.csv\t3\t2\t"));
        assert!(row.trim_end().ends_with("momentum"));
    }

    #[test]
    fn test_summary_lists_runs() {
        let mut readout = sample_readout();
        assert!(!format_summary(&readout).contains("Runs / 运行号"));

        readout.runs.insert(163_255, 30);
        readout.runs.insert(146_644, 2);
        let summary = format_summary(&readout);
        assert!(summary.contains("Runs / 运行号:         146644 (2), 163255 (30)"));
    }

    #[test]
    fn test_export_document_round_trip() {
        let readout = sample_readout();
        let doc = ExportDocument::new(readout.clone(), &[PathBuf::from("W.csv")]);
        let json = serde_json::to_string(&doc).unwrap();
        let back: ExportDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.readout, readout);
        assert_eq!(back.sources, vec!["W.csv".to_string()]);
    }
}
