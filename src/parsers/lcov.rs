//! Parser for the LCOV `.info` format.
//!
//! Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
//!
//! Key records:
//!   TN:<test name>
//!   SF:<path to source file>
//!   FN:<line>,<function name>
//!   FNDA:<execution count>,<function name>
//!   DA:<line number>,<execution count>[,<checksum>]
//!   BRDA:<line>,<block>,<branch>,<taken>   ("-" means 0)
//!   LF/LH/FNF/FNH/BRF/BRH summary lines
//!   end_of_record
//!
//! Each `SF` opens a File node under the report root and each function a
//! Method node under its file. A function's start line is recorded on its
//! Method node with the `FNDA` execution count.

use std::collections::HashMap;
use std::io::{BufRead, ErrorKind};

use tracing::debug;

use super::{CoverageParser, ElementKinds, Format};
use crate::element::ElementRegistry;
use crate::error::{CovgateError, Result};
use crate::model::{CoverageTree, LineRecord, NodeId};

/// LCOV format parser.
#[derive(Debug, Clone, Default)]
pub struct LcovParser {
    kinds: ElementKinds,
}

impl LcovParser {
    pub fn new(registry: &ElementRegistry) -> Result<Self> {
        Ok(Self {
            kinds: ElementKinds::resolve(registry)?,
        })
    }
}

impl CoverageParser for LcovParser {
    fn format(&self) -> Format {
        Format::Lcov
    }

    fn parse(&self, reader: &mut dyn BufRead, report_name: &str) -> Result<CoverageTree> {
        let kinds = &self.kinds;
        let mut tree = CoverageTree::new(kinds.report.clone(), format!("lcov: {}", report_name));
        let root = tree.root();

        let mut current_file: Option<NodeId> = None;
        // Function start lines from FN records, keyed by name.
        let mut fn_lines: HashMap<String, u32> = HashMap::new();

        let mut raw_line = String::new();
        loop {
            raw_line.clear();
            let n = reader.read_line(&mut raw_line).map_err(|e| {
                if e.kind() == ErrorKind::InvalidData {
                    CovgateError::MalformedReport("invalid UTF-8 in LCOV data".to_string())
                } else {
                    CovgateError::Io(e)
                }
            })?;
            if n == 0 {
                break;
            }

            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            if line == "end_of_record" {
                current_file = None;
                fn_lines.clear();
                continue;
            }

            let Some((tag, value)) = line.split_once(':') else {
                continue;
            };

            if tag == "SF" {
                let file = tree.add_child(root, kinds.file.clone(), value)?;
                tree.set_relative_source_path(file, Some(value.to_string()));
                current_file = Some(file);
                fn_lines.clear();
                continue;
            }

            // Everything else describes the current file.
            let Some(file) = current_file else {
                continue;
            };

            match tag {
                "FN" => {
                    if let Some((line_str, name)) = value.split_once(',') {
                        let method = tree.add_child(file, kinds.method.clone(), name)?;
                        if let Ok(start_line) = line_str.parse::<u32>() {
                            fn_lines.insert(name.to_string(), start_line);
                            // Declared but not yet known to run.
                            tree.record_line(method, start_line, LineRecord::new(0));
                        }
                    }
                }
                "FNDA" => {
                    if let Some((count_str, name)) = value.split_once(',') {
                        let hits = count_str.parse::<u64>().unwrap_or(0);
                        let method = tree.add_child(file, kinds.method.clone(), name)?;
                        if let Some(&start_line) = fn_lines.get(name) {
                            tree.record_line(method, start_line, LineRecord::new(hits));
                        }
                    }
                }
                "DA" => {
                    // Some instrumenters use negative counts (e.g., -1) to
                    // mark non-instrumentable lines. Skip those entirely.
                    let parts: Vec<&str> = value.splitn(3, ',').collect();
                    if parts.len() >= 2 {
                        if let (Ok(number), Ok(count)) =
                            (parts[0].parse::<u32>(), parts[1].parse::<i64>())
                        {
                            if count >= 0 {
                                tree.record_line(file, number, LineRecord::new(count as u64));
                            }
                        }
                    }
                }
                "BRDA" => {
                    let parts: Vec<&str> = value.splitn(4, ',').collect();
                    if parts.len() == 4 {
                        if let Ok(number) = parts[0].parse::<u32>() {
                            let taken = if parts[3] == "-" {
                                0
                            } else {
                                parts[3].parse::<u64>().unwrap_or(0)
                            };
                            let record = tree.line_mut(file, number);
                            record.branches_total += 1;
                            if taken > 0 {
                                record.branches_covered += 1;
                            }
                        }
                    }
                }
                // TN and the LF, LH, FNF, FNH, BRF, BRH summaries; counts are
                // derived from the data instead.
                _ => {}
            }
        }

        debug!(
            report = report_name,
            nodes = tree.node_count(),
            "parsed lcov coverage report"
        );
        Ok(tree)
    }
}
