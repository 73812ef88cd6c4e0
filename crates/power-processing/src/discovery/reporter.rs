//! Computes a [`DiscoveryReport`] from a directory of raw exports.

use super::report::{
    ColumnDetail, DiscoveryReport, FileSummary, LabelCount, NumericSummary, UniqueValues,
    UnparsableFile,
};
use crate::error::{ProcessingError, Result};
use crate::table::{Table, TableColumn, list_csv_files};
use crate::utils::{mean, quantile_sorted, sample_std};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Column whose value distribution is reported when present.
pub const LABEL_COLUMN: &str = "label";

/// Columns at or below this many distinct values list them in the report.
pub const MAX_LISTED_UNIQUE_VALUES: usize = 10;

enum FileOutcome {
    Empty,
    Unparsable(String),
    Parsed(Table),
}

/// Lenient, read-only pass over raw CSV exports.
///
/// Unlike the training loader, individual files that are empty or fail to
/// parse are recorded and skipped.
pub struct DiscoveryReporter;

impl DiscoveryReporter {
    pub fn discover(dir: &Path) -> Result<DiscoveryReport> {
        let paths = list_csv_files(dir)?;
        let outcomes: Vec<FileOutcome> = paths.par_iter().map(|p| read_file(p)).collect();

        let mut parsed: Vec<(String, Table)> = Vec::new();
        let mut empty_files = Vec::new();
        let mut unparsable_files = Vec::new();

        for (path, outcome) in paths.iter().zip(outcomes) {
            let file = file_name(path);
            match outcome {
                FileOutcome::Empty => {
                    debug!("Skipping empty file {}", file);
                    empty_files.push(file);
                }
                FileOutcome::Unparsable(error) => {
                    warn!("Skipping unparsable file {}: {}", file, error);
                    unparsable_files.push(UnparsableFile { file, error });
                }
                FileOutcome::Parsed(table) => parsed.push((file, table)),
            }
        }

        let total_rows: usize = parsed.iter().map(|(_, t)| t.n_rows()).sum();
        if total_rows == 0 {
            return Err(ProcessingError::AllFilesEmpty(dir.to_path_buf()));
        }

        let files = parsed
            .iter()
            .map(|(file, table)| FileSummary {
                file: file.clone(),
                rows: table.n_rows(),
                labels: table
                    .column(LABEL_COLUMN)
                    .map(|column| distinct_values(column).into_iter().collect()),
            })
            .collect();

        let combined = Table::concat(parsed.into_iter().map(|(_, t)| t).collect());
        info!(
            "Discovered {} file(s), {} total rows, {} column(s)",
            paths.len(),
            combined.n_rows(),
            combined.columns().len()
        );

        Ok(DiscoveryReport {
            source_dir: dir.to_path_buf(),
            total_files: paths.len(),
            files,
            empty_files,
            unparsable_files,
            total_rows,
            columns: combined
                .columns()
                .iter()
                .map(|c| column_detail(c, total_rows))
                .collect(),
            numeric_statistics: combined.columns().iter().filter_map(numeric_summary).collect(),
            label_distribution: combined
                .column(LABEL_COLUMN)
                .map(|c| label_distribution(c, total_rows)),
            unique_values: combined.columns().iter().map(unique_values).collect(),
        })
    }
}

fn read_file(path: &Path) -> FileOutcome {
    if std::fs::metadata(path).is_ok_and(|m| m.len() == 0) {
        return FileOutcome::Empty;
    }
    match Table::read_csv(path) {
        Ok(table) => FileOutcome::Parsed(table),
        Err(ProcessingError::Parse { source, .. }) => FileOutcome::Unparsable(source.to_string()),
        Err(other) => FileOutcome::Unparsable(other.to_string()),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn distinct_values(column: &TableColumn) -> BTreeSet<String> {
    column.present().map(|cell| cell.render()).collect()
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * count as f64 / total as f64
    }
}

fn column_detail(column: &TableColumn, total_rows: usize) -> ColumnDetail {
    let missing = column.missing_count();
    ColumnDetail {
        name: column.name.clone(),
        dtype: column.kind.dtype_name(missing > 0).to_string(),
        non_null: column.len() - missing,
        missing,
        missing_pct: percent(missing, total_rows),
    }
}

fn numeric_summary(column: &TableColumn) -> Option<NumericSummary> {
    let mut values = column.numeric_values()?;
    values.sort_by(f64::total_cmp);

    Some(NumericSummary {
        column: column.name.clone(),
        count: values.len(),
        mean: mean(&values),
        std: sample_std(&values),
        min: values.first().copied(),
        q25: quantile_sorted(&values, 0.25),
        median: quantile_sorted(&values, 0.5),
        q75: quantile_sorted(&values, 0.75),
        max: values.last().copied(),
        missing: column.missing_count(),
    })
}

/// Counts per value, most frequent first; ties keep first-seen order.
fn label_distribution(column: &TableColumn, total_rows: usize) -> Vec<LabelCount> {
    let mut counts: Vec<(Option<String>, usize)> = Vec::new();
    for cell in &column.cells {
        let key = cell.as_ref().map(|c| c.render());
        match counts.iter_mut().find(|(label, _)| *label == key) {
            Some((_, count)) => *count += 1,
            None => counts.push((key, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    counts
        .into_iter()
        .map(|(label, count)| LabelCount {
            label,
            count,
            percentage: percent(count, total_rows),
        })
        .collect()
}

fn unique_values(column: &TableColumn) -> UniqueValues {
    let distinct = distinct_values(column);
    let unique_count = distinct.len();
    UniqueValues {
        column: column.name.clone(),
        unique_count,
        values: (unique_count <= MAX_LISTED_UNIQUE_VALUES).then(|| distinct.into_iter().collect()),
    }
}
