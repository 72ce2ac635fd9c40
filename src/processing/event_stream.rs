//! 事例流：把连续的两条记录配成一个粒子对
//!
//! 按行顺序读取，跳过空行和注释，第一条记录为领头粒子。
//! 流结束时若剩下一条未配对的记录，返回致命的结构错误。

use super::record_parser::RecordParser;
use crate::core::particle::Particle;
use crate::error::{AnalysisError, AnalysisResult};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// 一个粒子对及其第一条记录所在行
#[derive(Debug, Clone)]
pub struct EventPair {
    pub first: Particle,
    pub second: Particle,
    pub line: usize,
}

/// 基于任意 `BufRead` 的粒子对迭代器
///
/// 遇到第一个错误后停止迭代。
pub struct EventStream<R> {
    lines: Lines<R>,
    parser: RecordParser,
    line_no: usize,
    records: usize,
    finished: bool,
}

impl EventStream<BufReader<File>> {
    /// 打开事例日志文件
    pub fn open(path: &Path, parser: RecordParser) -> AnalysisResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), parser))
    }
}

impl<R: BufRead> EventStream<R> {
    pub fn new(reader: R, parser: RecordParser) -> Self {
        Self {
            lines: reader.lines(),
            parser,
            line_no: 0,
            records: 0,
            finished: false,
        }
    }

    /// 已读取的记录数（不含跳过的行）
    #[inline]
    pub fn records_read(&self) -> usize {
        self.records
    }

    /// 已读取的物理行数
    #[inline]
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// 读取下一条记录，跳过空行与注释
    fn next_record(&mut self) -> Option<AnalysisResult<(Particle, usize)>> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(AnalysisError::from(e))),
            };
            self.line_no += 1;

            if RecordParser::is_skippable(&line) {
                continue;
            }

            self.records += 1;
            return Some(
                self.parser
                    .parse_line(&line, self.line_no)
                    .map(|p| (p, self.line_no)),
            );
        }
    }
}

impl<R: BufRead> Iterator for EventStream<R> {
    type Item = AnalysisResult<EventPair>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let result = match self.next_record() {
            None => {
                self.finished = true;
                return None;
            }
            Some(Err(e)) => Err(e),
            Some(Ok((first, line))) => match self.next_record() {
                None => Err(AnalysisError::StructureError(format!(
                    "record count must be even: 第{line}行的记录没有配对 ({} 条记录)",
                    self.records
                ))),
                Some(Err(e)) => Err(e),
                Some(Ok((second, _))) => Ok(EventPair {
                    first,
                    second,
                    line,
                }),
            },
        };

        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

/// 预扫描：统计记录条数（用于进度报告）
pub fn count_records<R: BufRead>(reader: R) -> AnalysisResult<usize> {
    let mut count = 0;
    for line in reader.lines() {
        if !RecordParser::is_skippable(&line?) {
            count += 1;
        }
    }
    Ok(count)
}
