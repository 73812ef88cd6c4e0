//! Discovery report types and their console rendering.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

const RULE_WIDTH: usize = 70;

/// Read-only summary of a directory of raw CSV exports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryReport {
    pub source_dir: PathBuf,
    /// Number of `.csv` files found, regardless of outcome.
    pub total_files: usize,
    /// Files that parsed, in file-name order.
    pub files: Vec<FileSummary>,
    /// Zero-byte files.
    pub empty_files: Vec<String>,
    pub unparsable_files: Vec<UnparsableFile>,
    pub total_rows: usize,
    pub columns: Vec<ColumnDetail>,
    pub numeric_statistics: Vec<NumericSummary>,
    /// Present only when the data has a `label` column.
    pub label_distribution: Option<Vec<LabelCount>>,
    pub unique_values: Vec<UniqueValues>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub file: String,
    pub rows: usize,
    /// Sorted distinct labels in this file; `None` without a label column.
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnparsableFile {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDetail {
    pub name: String,
    pub dtype: String,
    pub non_null: usize,
    pub missing: usize,
    pub missing_pct: f64,
}

/// Describe-style statistics of a numeric column. Undefined values are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelCount {
    /// `None` is the bucket for rows without a label.
    pub label: Option<String>,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniqueValues {
    pub column: String,
    pub unique_count: usize,
    /// Sorted values, listed only for low-cardinality columns.
    pub values: Option<Vec<String>>,
}

impl DiscoveryReport {
    pub fn label_count(&self, label: &str) -> Option<&LabelCount> {
        self.label_distribution
            .as_ref()?
            .iter()
            .find(|entry| entry.label.as_deref() == Some(label))
    }
}

fn stat(value: Option<f64>) -> String {
    value.map_or_else(|| "NaN".to_string(), |v| format!("{v:.4}"))
}

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{}", "-".repeat(RULE_WIDTH))?;
    writeln!(f, "{title}")?;
    writeln!(f, "{}", "-".repeat(RULE_WIDTH))
}

impl fmt::Display for DiscoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(f, "DATA DISCOVERY REPORT")?;
        writeln!(f, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(f)?;
        writeln!(f, "Source directory: {}", self.source_dir.display())?;
        writeln!(f, "Total CSV files:  {}", self.total_files)?;
        writeln!(f, "  Non-empty:      {}", self.files.len())?;
        writeln!(f, "  Empty:          {}", self.empty_files.len())?;

        if !self.empty_files.is_empty() {
            writeln!(f)?;
            writeln!(f, "Empty files: {}", self.empty_files.join(", "))?;
        }

        if !self.unparsable_files.is_empty() {
            writeln!(f)?;
            writeln!(f, "Skipped (parse errors): {}", self.unparsable_files.len())?;
            for skipped in &self.unparsable_files {
                writeln!(f, "  {}: {}", skipped.file, skipped.error)?;
            }
        }

        section(f, "FILE SUMMARY")?;
        writeln!(f, "{:<45} {:>7} Labels", "File", "Rows")?;
        writeln!(f, "{}", "-".repeat(RULE_WIDTH))?;
        for file in &self.files {
            let labels = file
                .labels
                .as_ref()
                .map_or_else(|| "N/A".to_string(), |labels| labels.join(", "));
            writeln!(f, "{:<45} {:>7} {}", file.file, file.rows, labels)?;
        }

        section(f, "COMBINED DATASET")?;
        let names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        writeln!(f, "Total rows:    {}", self.total_rows)?;
        writeln!(f, "Total columns: {}", self.columns.len())?;
        writeln!(f, "Columns:       {names:?}")?;

        section(f, "COLUMN DETAILS")?;
        writeln!(
            f,
            "{:<30} {:<12} {:>10} {:>10} {:>10}",
            "Column", "Dtype", "Non-Null", "Missing", "Missing%"
        )?;
        writeln!(f, "{}", "-".repeat(RULE_WIDTH))?;
        for column in &self.columns {
            writeln!(
                f,
                "{:<30} {:<12} {:>10} {:>10} {:>9.1}%",
                column.name, column.dtype, column.non_null, column.missing, column.missing_pct
            )?;
        }

        if !self.numeric_statistics.is_empty() {
            section(f, "NUMERIC STATISTICS")?;
            writeln!(
                f,
                "{:<24} {:>7} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>8}",
                "", "count", "mean", "std", "min", "25%", "50%", "75%", "max", "missing"
            )?;
            for s in &self.numeric_statistics {
                writeln!(
                    f,
                    "{:<24} {:>7} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>8}",
                    s.column,
                    s.count,
                    stat(s.mean),
                    stat(s.std),
                    stat(s.min),
                    stat(s.q25),
                    stat(s.median),
                    stat(s.q75),
                    stat(s.max),
                    s.missing
                )?;
            }
        }

        if let Some(distribution) = &self.label_distribution {
            section(f, "LABEL DISTRIBUTION")?;
            for entry in distribution {
                let label = entry.label.as_deref().unwrap_or("(missing)");
                writeln!(
                    f,
                    "  {:<25} {:>7} ({:5.1}%)",
                    label, entry.count, entry.percentage
                )?;
            }
        }

        section(f, "UNIQUE VALUES PER COLUMN")?;
        for unique in &self.unique_values {
            let sample = unique
                .values
                .as_ref()
                .map(|values| format!("  ->  {values:?}"))
                .unwrap_or_default();
            writeln!(
                f,
                "  {:<30} {:>7} unique{}",
                unique.column, unique.unique_count, sample
            )?;
        }

        writeln!(f)?;
        writeln!(f, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(f, "END OF REPORT")?;
        write!(f, "{}", "=".repeat(RULE_WIDTH))
    }
}
