//! Dataset drift validation
//!
//! Compares a reference dataset's schema against newly arrived data and
//! emits a pass/fail report. Data-quality findings never raise: every
//! check lands as a message in the report and the overall outcome is the
//! conjunction of the individual checks.

use crate::data::frame::Frame;
use crate::types::Timestamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Result of one validation run; persisted append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub success: bool,
    pub messages: Vec<String>,
    pub timestamp: Timestamp,
}

/// Validate the current frame against the reference schema
pub fn validate(reference: &Frame, current: &Frame) -> ValidationReport {
    let mut success = true;
    let mut messages = Vec::new();
    let mut check = |ok: bool, pass: &str, fail: &str| {
        success &= ok;
        messages.push(if ok { pass.to_string() } else { fail.to_string() });
    };

    check(
        reference.column_names() == current.column_names(),
        "Column names match the reference",
        "Column names do not match the reference",
    );

    check(
        reference.n_cols() == current.n_cols(),
        "Column count matches the reference",
        "Column count does not match the reference",
    );

    check(
        reference.dtypes() == current.dtypes(),
        "Column types match the reference",
        "Column types do not match the reference",
    );

    if reference.column("Target").is_some() {
        match current.column("Target") {
            Some(column) => {
                let valid = column
                    .as_f64()
                    .iter()
                    .all(|cell| matches!(cell, Some(v) if *v == 0.0 || *v == 1.0));
                check(
                    valid,
                    "'Target' values are all within {0, 1}",
                    "'Target' column contains values outside {0, 1}",
                );
            }
            None => check(
                false,
                "",
                "'Target' column is missing from the current data",
            ),
        }
    }

    ValidationReport {
        success,
        messages,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::Column;
    use chrono::NaiveDate;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    fn frame(targets: Vec<Option<i64>>) -> Frame {
        let n = targets.len();
        Frame::with_columns(vec![
            Column::date("Date", (0..n).map(|i| day(i as u32 + 1)).collect()),
            Column::float("Close", (0..n).map(|i| Some(100.0 + i as f64)).collect()),
            Column::int("Target", targets),
        ])
        .unwrap()
    }

    #[test]
    fn test_identical_schema_passes() {
        let reference = frame(vec![Some(0), Some(1), Some(1), Some(0)]);
        let current = frame(vec![Some(0), Some(1), Some(1), Some(0)]);

        let report = validate(&reference, &current);

        assert!(report.success);
        assert_eq!(report.messages.len(), 4);
    }

    #[test]
    fn test_invalid_target_values_fail() {
        let reference = frame(vec![Some(0), Some(1), Some(1)]);
        let current = frame(vec![Some(0), Some(1), Some(2)]);

        let report = validate(&reference, &current);

        assert!(!report.success);
        assert!(report
            .messages
            .iter()
            .any(|m| m.contains("outside {0, 1}")));
    }

    #[test]
    fn test_missing_target_column_fails() {
        let reference = frame(vec![Some(0), Some(1)]);
        let mut current = frame(vec![Some(0), Some(1)]);
        current.drop_column("Target");

        let report = validate(&reference, &current);

        assert!(!report.success);
        assert!(report
            .messages
            .iter()
            .any(|m| m.contains("'Target' column is missing")));
    }

    #[test]
    fn test_dtype_drift_fails() {
        let reference = frame(vec![Some(0), Some(1)]);
        let current = Frame::with_columns(vec![
            Column::date("Date", vec![day(1), day(2)]),
            Column::float("Close", vec![Some(100.0), Some(101.0)]),
            // Target arrives as floats instead of ints
            Column::float("Target", vec![Some(0.0), Some(1.0)]),
        ])
        .unwrap();

        let report = validate(&reference, &current);

        assert!(!report.success);
        assert!(report
            .messages
            .iter()
            .any(|m| m == "Column types do not match the reference"));
        // The value-domain check still passes independently
        assert!(report
            .messages
            .iter()
            .any(|m| m == "'Target' values are all within {0, 1}"));
    }

    #[test]
    fn test_null_target_counts_as_invalid() {
        let reference = frame(vec![Some(0), Some(1)]);
        let current = frame(vec![Some(0), None]);

        let report = validate(&reference, &current);

        assert!(!report.success);
    }

    #[test]
    fn test_reference_without_target_skips_domain_check() {
        let mut reference = frame(vec![Some(0)]);
        reference.drop_column("Target");
        let mut current = frame(vec![Some(0)]);
        current.drop_column("Target");

        let report = validate(&reference, &current);

        assert!(report.success);
        assert_eq!(report.messages.len(), 3);
    }
}
