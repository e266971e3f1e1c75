//! Ordered, typed column frame
//!
//! The data contract shared by the feature builder, splitter, drift
//! validator and trainer: columns keep their insertion order, carry a
//! dtype tag and allow per-cell nulls. CSV round-trips preserve column
//! order; dtypes are re-inferred on read.

use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Column data type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Date,
    Int,
    Float,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Date => write!(f, "date"),
            ColumnType::Int => write!(f, "int"),
            ColumnType::Float => write!(f, "float"),
        }
    }
}

/// Column values; dates are non-nullable, numeric cells may be null
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Date(Vec<NaiveDate>),
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
}

impl ColumnValues {
    fn len(&self) -> usize {
        match self {
            ColumnValues::Date(v) => v.len(),
            ColumnValues::Int(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
        }
    }

    fn take(&self, indices: &[usize]) -> ColumnValues {
        match self {
            ColumnValues::Date(v) => {
                ColumnValues::Date(indices.iter().map(|&i| v[i]).collect())
            }
            ColumnValues::Int(v) => ColumnValues::Int(indices.iter().map(|&i| v[i]).collect()),
            ColumnValues::Float(v) => {
                ColumnValues::Float(indices.iter().map(|&i| v[i]).collect())
            }
        }
    }

    fn truncate(&mut self, len: usize) {
        match self {
            ColumnValues::Date(v) => v.truncate(len),
            ColumnValues::Int(v) => v.truncate(len),
            ColumnValues::Float(v) => v.truncate(len),
        }
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: ColumnValues,
}

impl Column {
    pub fn date(name: impl Into<String>, values: Vec<NaiveDate>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Date(values),
        }
    }

    pub fn int(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Int(values),
        }
    }

    pub fn float(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Float(values),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> ColumnType {
        match self.values {
            ColumnValues::Date(_) => ColumnType::Date,
            ColumnValues::Int(_) => ColumnType::Int,
            ColumnValues::Float(_) => ColumnType::Float,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values(&self) -> &ColumnValues {
        &self.values
    }

    /// Dates in this column, if it is a date column
    pub fn as_dates(&self) -> Option<&[NaiveDate]> {
        match &self.values {
            ColumnValues::Date(v) => Some(v),
            _ => None,
        }
    }

    /// Integer cells in this column, if it is an int column
    pub fn as_ints(&self) -> Option<&[Option<i64>]> {
        match &self.values {
            ColumnValues::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Cells widened to f64; dates become days since the Unix epoch
    pub fn as_f64(&self) -> Vec<Option<f64>> {
        match &self.values {
            ColumnValues::Date(v) => v
                .iter()
                .map(|d| {
                    Some(
                        d.signed_duration_since(NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch"))
                            .num_days() as f64,
                    )
                })
                .collect(),
            ColumnValues::Int(v) => v.iter().map(|c| c.map(|x| x as f64)).collect(),
            ColumnValues::Float(v) => v.clone(),
        }
    }
}

/// Ordered collection of equal-length columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame, checking that all columns have the same length
    pub fn with_columns(columns: Vec<Column>) -> Result<Self> {
        let mut frame = Self::new();
        for column in columns {
            frame.push_column(column)?;
        }
        Ok(frame)
    }

    /// Append a column, preserving the equal-length invariant
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                return Err(PipelineError::SchemaMismatch(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name(),
                    column.len(),
                    first.len()
                )));
            }
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub fn dtypes(&self) -> Vec<ColumnType> {
        self.columns.iter().map(|c| c.dtype()).collect()
    }

    /// Remove a column by name; unknown names are ignored
    pub fn drop_column(&mut self, name: &str) {
        self.columns.retain(|c| c.name() != name);
    }

    /// Reorder all rows so the given date column ascends
    pub fn sort_by_date(&mut self, date_column: &str) -> Result<()> {
        let dates = self
            .column(date_column)
            .and_then(|c| c.as_dates().map(<[NaiveDate]>::to_vec))
            .ok_or_else(|| {
                PipelineError::SchemaMismatch(format!("no date column '{date_column}'"))
            })?;

        let mut indices: Vec<usize> = (0..dates.len()).collect();
        indices.sort_by_key(|&i| dates[i]);

        for column in &mut self.columns {
            column.values = column.values.take(&indices);
        }
        Ok(())
    }

    /// Copy a contiguous row range into a new frame
    pub fn slice_rows(&self, start: usize, end: usize) -> Frame {
        let indices: Vec<usize> = (start..end.min(self.n_rows())).collect();
        Frame {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c.values.take(&indices),
                })
                .collect(),
        }
    }

    /// Drop the final row of every column
    pub fn drop_last_row(&mut self) {
        let n = self.n_rows();
        if n == 0 {
            return;
        }
        for column in &mut self.columns {
            column.values.truncate(n - 1);
        }
    }

    /// Impute numeric nulls with the column mean (ints round to nearest)
    pub fn mean_fill(&mut self) {
        for column in &mut self.columns {
            match &mut column.values {
                ColumnValues::Float(v) => {
                    let present: Vec<f64> = v.iter().flatten().copied().collect();
                    if present.is_empty() {
                        continue;
                    }
                    let mean = present.iter().sum::<f64>() / present.len() as f64;
                    for cell in v.iter_mut() {
                        if cell.is_none() {
                            *cell = Some(mean);
                        }
                    }
                }
                ColumnValues::Int(v) => {
                    let present: Vec<i64> = v.iter().flatten().copied().collect();
                    if present.is_empty() {
                        continue;
                    }
                    let mean =
                        (present.iter().sum::<i64>() as f64 / present.len() as f64).round() as i64;
                    for cell in v.iter_mut() {
                        if cell.is_none() {
                            *cell = Some(mean);
                        }
                    }
                }
                ColumnValues::Date(_) => {}
            }
        }
    }

    /// Non-null f64 values of a column; errors on nulls or a missing column
    pub fn required_f64(&self, name: &str) -> Result<Vec<f64>> {
        let column = self
            .column(name)
            .ok_or_else(|| PipelineError::SchemaMismatch(format!("missing column '{name}'")))?;
        column
            .as_f64()
            .into_iter()
            .map(|cell| {
                cell.ok_or_else(|| {
                    PipelineError::SchemaMismatch(format!("column '{name}' contains nulls"))
                })
            })
            .collect()
    }

    /// Row-major predictor matrix for the named columns
    pub fn feature_matrix(&self, names: &[&str]) -> Result<Vec<Vec<f64>>> {
        let columns: Vec<Vec<f64>> = names
            .iter()
            .map(|name| self.required_f64(name))
            .collect::<Result<_>>()?;
        let n = self.n_rows();
        let mut rows = Vec::with_capacity(n);
        for i in 0..n {
            rows.push(columns.iter().map(|c| c[i]).collect());
        }
        Ok(rows)
    }

    /// Write the frame as CSV; nulls become empty cells
    pub fn to_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(self.column_names())?;

        for i in 0..self.n_rows() {
            let record: Vec<String> = self
                .columns
                .iter()
                .map(|c| match &c.values {
                    ColumnValues::Date(v) => v[i].format("%Y-%m-%d").to_string(),
                    ColumnValues::Int(v) => v[i].map(|x| x.to_string()).unwrap_or_default(),
                    // Debug formatting keeps the decimal point so whole
                    // floats re-infer as floats on read
                    ColumnValues::Float(v) => v[i].map(|x| format!("{x:?}")).unwrap_or_default(),
                })
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a CSV, inferring each column as date, int or float
    pub fn from_csv(path: &Path) -> Result<Frame> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record?;
            for (i, cell) in record.iter().enumerate() {
                if i < cells.len() {
                    cells[i].push(cell.to_string());
                }
            }
        }

        let mut columns = Vec::with_capacity(headers.len());
        for (name, raw) in headers.into_iter().zip(cells) {
            columns.push(infer_column(name, &raw)?);
        }
        Frame::with_columns(columns)
    }
}

fn infer_column(name: String, raw: &[String]) -> Result<Column> {
    let non_empty: Vec<&String> = raw.iter().filter(|c| !c.is_empty()).collect();

    if !non_empty.is_empty() && non_empty.len() == raw.len() {
        let dates: Option<Vec<NaiveDate>> = raw
            .iter()
            .map(|c| NaiveDate::parse_from_str(c, "%Y-%m-%d").ok())
            .collect();
        if let Some(dates) = dates {
            return Ok(Column::date(name, dates));
        }
    }

    let ints: Option<Vec<Option<i64>>> = raw
        .iter()
        .map(|c| {
            if c.is_empty() {
                Some(None)
            } else {
                c.parse::<i64>().ok().map(Some)
            }
        })
        .collect();
    if let Some(ints) = ints {
        return Ok(Column::int(name, ints));
    }

    let floats: Option<Vec<Option<f64>>> = raw
        .iter()
        .map(|c| {
            if c.is_empty() {
                Some(None)
            } else {
                c.parse::<f64>().ok().map(Some)
            }
        })
        .collect();
    match floats {
        Some(floats) => Ok(Column::float(name, floats)),
        None => Err(PipelineError::SchemaMismatch(format!(
            "column '{name}' has non-numeric values"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    #[test]
    fn test_equal_length_invariant() {
        let result = Frame::with_columns(vec![
            Column::float("a", vec![Some(1.0), Some(2.0)]),
            Column::float("b", vec![Some(1.0)]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sort_by_date() {
        let mut frame = Frame::with_columns(vec![
            Column::date("Date", vec![day(3), day(1), day(2)]),
            Column::float("Close", vec![Some(103.0), Some(101.0), Some(102.0)]),
        ])
        .unwrap();

        frame.sort_by_date("Date").unwrap();

        assert_eq!(
            frame.column("Date").unwrap().as_dates().unwrap(),
            &[day(1), day(2), day(3)]
        );
        assert_eq!(
            frame.required_f64("Close").unwrap(),
            vec![101.0, 102.0, 103.0]
        );
    }

    #[test]
    fn test_mean_fill() {
        let mut frame = Frame::with_columns(vec![Column::float(
            "x",
            vec![Some(1.0), None, Some(3.0)],
        )])
        .unwrap();

        frame.mean_fill();

        assert_eq!(frame.required_f64("x").unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_feature_matrix() {
        let frame = Frame::with_columns(vec![
            Column::float("a", vec![Some(1.0), Some(2.0)]),
            Column::float("b", vec![Some(10.0), Some(20.0)]),
        ])
        .unwrap();

        let matrix = frame.feature_matrix(&["a", "b"]).unwrap();
        assert_eq!(matrix, vec![vec![1.0, 10.0], vec![2.0, 20.0]]);
    }

    #[test]
    fn test_feature_matrix_rejects_nulls() {
        let frame =
            Frame::with_columns(vec![Column::float("a", vec![Some(1.0), None])]).unwrap();
        assert!(frame.feature_matrix(&["a"]).is_err());
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.csv");

        let frame = Frame::with_columns(vec![
            Column::date("Date", vec![day(1), day(2)]),
            Column::float("Close", vec![Some(100.0), None]),
            Column::int("Target", vec![Some(1), None]),
        ])
        .unwrap();

        frame.to_csv(&path).unwrap();
        let back = Frame::from_csv(&path).unwrap();

        assert_eq!(back, frame);
        assert_eq!(
            back.dtypes(),
            vec![ColumnType::Date, ColumnType::Float, ColumnType::Int]
        );
    }

    #[test]
    fn test_slice_rows() {
        let frame = Frame::with_columns(vec![Column::int(
            "x",
            vec![Some(0), Some(1), Some(2), Some(3)],
        )])
        .unwrap();

        let tail = frame.slice_rows(2, 4);
        assert_eq!(tail.n_rows(), 2);
        assert_eq!(
            tail.column("x").unwrap().as_ints().unwrap(),
            &[Some(2), Some(3)]
        );
    }
}
