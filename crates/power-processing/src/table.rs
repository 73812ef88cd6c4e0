//! In-memory tabular data read from CSV exports.
//!
//! Files are parsed with Polars and converted into a small, owned cell
//! representation that keeps the column's inferred kind and explicit
//! missing values. Multiple files are combined with a diagonal concat:
//! the column set is the union of all files in first-seen order and rows
//! lacking a column read as missing.

use crate::error::{ProcessingError, Result};
use crate::utils::{DtypeCategory, format_float, get_dtype_category};
use polars::prelude::*;
use std::path::{Path, PathBuf};

/// Extension of the tabular export files.
pub const CSV_EXTENSION: &str = "csv";

/// A single non-missing cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl CellValue {
    /// Stringified value, as used for labels and unique-value samples.
    pub fn render(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => format_float(*v),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Text(v) => v.clone(),
        }
    }

    /// Numeric reading of the cell. Text is parsed; booleans map to 1 and 0.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Text(v) => v.trim().parse::<f64>().ok(),
        }
    }

    fn coerce(self, kind: ColumnKind) -> Self {
        match (kind, self) {
            (ColumnKind::Float, Self::Int(v)) => Self::Float(v as f64),
            (ColumnKind::Text, Self::Text(v)) => Self::Text(v),
            (ColumnKind::Text, other) => Self::Text(other.render()),
            (_, other) => other,
        }
    }
}

/// Inferred kind of a whole column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl ColumnKind {
    /// Whether the column's values are uniformly numeric.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// Dtype name shown in discovery reports.
    ///
    /// Integer columns with gaps widen to float and boolean columns with gaps
    /// become generic objects, matching how the exports are usually inspected.
    pub fn dtype_name(self, has_missing: bool) -> &'static str {
        match (self, has_missing) {
            (Self::Integer, false) => "int64",
            (Self::Integer, true) | (Self::Float, _) => "float64",
            (Self::Boolean, false) => "bool",
            (Self::Boolean, true) | (Self::Text, _) => "object",
        }
    }

    fn unify(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Integer, Self::Float) | (Self::Float, Self::Integer) => Self::Float,
            _ => Self::Text,
        }
    }
}

/// A named column of optional cells.
#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub name: String,
    pub kind: ColumnKind,
    pub cells: Vec<Option<CellValue>>,
}

impl TableColumn {
    fn from_polars(column: &Column) -> PolarsResult<Self> {
        let name = column.name().to_string();
        let series = column.as_materialized_series();

        let (kind, cells) = match get_dtype_category(series.dtype()) {
            DtypeCategory::Integer => {
                let cast = series.cast(&DataType::Int64)?;
                let cells = cast.i64()?.into_iter().map(|v| v.map(CellValue::Int)).collect();
                (ColumnKind::Integer, cells)
            }
            DtypeCategory::Float => {
                let cast = series.cast(&DataType::Float64)?;
                let cells = cast
                    .f64()?
                    .into_iter()
                    .map(|v| v.filter(|x| !x.is_nan()).map(CellValue::Float))
                    .collect();
                (ColumnKind::Float, cells)
            }
            DtypeCategory::Boolean => {
                let cells = series.bool()?.into_iter().map(|v| v.map(CellValue::Bool)).collect();
                (ColumnKind::Boolean, cells)
            }
            DtypeCategory::String | DtypeCategory::Other => {
                let cast = series.cast(&DataType::String)?;
                let cells = cast
                    .str()?
                    .into_iter()
                    .map(|v| v.map(|s| CellValue::Text(s.to_string())))
                    .collect();
                (ColumnKind::Text, cells)
            }
            // An entirely empty column reads as a float column of gaps.
            DtypeCategory::Null => (ColumnKind::Float, vec![None; series.len()]),
        };

        Ok(Self { name, kind, cells })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    /// Iterator over the non-missing cells, in row order.
    pub fn present(&self) -> impl Iterator<Item = &CellValue> {
        self.cells.iter().flatten()
    }

    /// Non-missing values as floats, when the column is numeric.
    pub fn numeric_values(&self) -> Option<Vec<f64>> {
        if !self.kind.is_numeric() {
            return None;
        }
        Some(self.present().filter_map(CellValue::as_f64).collect())
    }
}

/// Rows of one or more CSV files, column-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<TableColumn>,
    n_rows: usize,
}

impl Table {
    /// Parse a CSV file with a header row.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let parse_error = |source| ProcessingError::Parse {
            path: path.to_path_buf(),
            source,
        };

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(parse_error)?;

        Self::from_data_frame(&df).map_err(parse_error)
    }

    /// Convert a Polars frame, keeping its column order.
    pub fn from_data_frame(df: &DataFrame) -> PolarsResult<Self> {
        let columns = df
            .get_columns()
            .iter()
            .map(TableColumn::from_polars)
            .collect::<PolarsResult<Vec<_>>>()?;
        Ok(Self {
            columns,
            n_rows: df.height(),
        })
    }

    /// Stack tables vertically in the given order.
    pub fn concat(parts: Vec<Table>) -> Table {
        let mut names: Vec<String> = Vec::new();
        for part in &parts {
            for column in &part.columns {
                if !names.contains(&column.name) {
                    names.push(column.name.clone());
                }
            }
        }

        let n_rows = parts.iter().map(|p| p.n_rows).sum();
        let mut columns = Vec::with_capacity(names.len());

        for name in names {
            let kind = parts
                .iter()
                .filter_map(|p| p.column(&name))
                .filter(|c| c.present().next().is_some())
                .map(|c| c.kind)
                .reduce(ColumnKind::unify)
                .unwrap_or(ColumnKind::Float);

            let mut cells = Vec::with_capacity(n_rows);
            for part in &parts {
                match part.column(&name) {
                    Some(column) => cells.extend(
                        column
                            .cells
                            .iter()
                            .map(|c| c.clone().map(|value| value.coerce(kind))),
                    ),
                    None => cells.extend(std::iter::repeat_n(None, part.n_rows)),
                }
            }

            columns.push(TableColumn { name, kind, cells });
        }

        Table { columns, n_rows }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// List `.csv` files in `dir`, sorted by file name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ProcessingError::DirectoryNotFound(dir.to_path_buf()));
    }
    let entries =
        std::fs::read_dir(dir).map_err(|_| ProcessingError::DirectoryNotFound(dir.to_path_buf()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_csv = path.extension().is_some_and(|ext| ext == CSV_EXTENSION);
        if is_csv && path.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(ProcessingError::NoDataFiles(dir.to_path_buf()));
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_read_csv_kinds_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "ride.csv",
            "power,cadence,label\n200,90.5,good\n,88.0,poor\n210,,good\n",
        );

        let table = Table::read_csv(&path).unwrap();
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.column_names(), vec!["power", "cadence", "label"]);

        let power = table.column("power").unwrap();
        assert_eq!(power.kind, ColumnKind::Integer);
        assert_eq!(power.missing_count(), 1);
        assert_eq!(power.kind.dtype_name(true), "float64");

        let cadence = table.column("cadence").unwrap();
        assert_eq!(cadence.kind, ColumnKind::Float);
        assert_eq!(cadence.numeric_values().unwrap(), vec![90.5, 88.0]);

        let label = table.column("label").unwrap();
        assert_eq!(label.kind, ColumnKind::Text);
        assert!(label.numeric_values().is_none());
    }

    #[test]
    fn test_concat_unions_columns_and_widens_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.csv", "power,label\n100,good\n");
        let b = write(dir.path(), "b.csv", "power,speed\n1.5,30\n2.5,31\n");

        let table = Table::concat(vec![
            Table::read_csv(&a).unwrap(),
            Table::read_csv(&b).unwrap(),
        ]);

        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.column_names(), vec!["power", "label", "speed"]);
        let power = table.column("power").unwrap();
        assert_eq!(power.kind, ColumnKind::Float);
        assert_eq!(power.cells[0], Some(CellValue::Float(100.0)));
        assert_eq!(table.column("label").unwrap().missing_count(), 2);
        assert_eq!(table.column("speed").unwrap().cells[0], None);
    }

    #[test]
    fn test_concat_mixed_kinds_become_text() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.csv", "label\n1\n");
        let b = write(dir.path(), "b.csv", "label\ngood\n");

        let table = Table::concat(vec![
            Table::read_csv(&a).unwrap(),
            Table::read_csv(&b).unwrap(),
        ]);
        let label = table.column("label").unwrap();
        assert_eq!(label.kind, ColumnKind::Text);
        assert_eq!(label.cells[0], Some(CellValue::Text("1".to_string())));
    }

    #[test]
    fn test_cell_rendering() {
        assert_eq!(CellValue::Int(3).render(), "3");
        assert_eq!(CellValue::Float(3.0).render(), "3.0");
        assert_eq!(CellValue::Bool(true).render(), "True");
        assert_eq!(CellValue::Text(" 4.5 ".to_string()).as_f64(), Some(4.5));
        assert_eq!(CellValue::Text("fast".to_string()).as_f64(), None);
    }

    #[test]
    fn test_list_csv_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.csv", "x\n1\n");
        write(dir.path(), "a.csv", "x\n1\n");
        write(dir.path(), "notes.txt", "ignore me");

        let files = list_csv_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_list_csv_files_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            list_csv_files(&missing),
            Err(ProcessingError::DirectoryNotFound(_))
        ));
        assert!(matches!(
            list_csv_files(dir.path()),
            Err(ProcessingError::NoDataFiles(_))
        ));
    }
}
