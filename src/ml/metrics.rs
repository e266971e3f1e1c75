//! Model evaluation metrics
//!
//! Classification (accuracy, precision, recall, F1) and regression
//! (MSE, MAE, explained variance) over equal-length truth/prediction
//! sequences. Zero-division cases score 0 instead of failing; mismatched
//! or empty inputs are the caller's error and reject with `ShapeMismatch`.

use crate::error::{PipelineError, Result};
use crate::types::Stage;
use serde::{Deserialize, Serialize};

/// Averaging policy for precision/recall/F1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Average {
    /// Score the positive class (label 1) only
    Binary,
    /// Average per-class scores weighted by class support
    Weighted,
}

/// Classification metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Regression metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub mae: f64,
    pub evs: f64,
}

/// Metrics of either task kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMetrics {
    Classification(ClassificationMetrics),
    Regression(RegressionMetrics),
}

/// Named metric values for one model at one lifecycle stage; immutable
/// once computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub model: String,
    pub stage: Stage,
    pub metrics: TaskMetrics,
}

impl MetricSet {
    /// Report entries in their canonical order
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        match self.metrics {
            TaskMetrics::Classification(m) => vec![
                ("Accuracy", m.accuracy),
                ("Precision", m.precision),
                ("Recall", m.recall),
                ("F1 Score", m.f1),
            ],
            TaskMetrics::Regression(m) => {
                vec![("MSE", m.mse), ("MAE", m.mae), ("EVS", m.evs)]
            }
        }
    }
}

fn check_shapes(y_true: &[f64], y_pred: &[f64]) -> Result<()> {
    if y_true.len() != y_pred.len() || y_true.is_empty() {
        return Err(PipelineError::ShapeMismatch {
            left: y_true.len(),
            right: y_pred.len(),
        });
    }
    Ok(())
}

/// Compute classification metrics over label sequences
pub fn classification_metrics(
    y_true: &[f64],
    y_pred: &[f64],
    average: Average,
) -> Result<ClassificationMetrics> {
    check_shapes(y_true, y_pred)?;

    let n = y_true.len() as f64;
    let accuracy = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| t == p)
        .count() as f64
        / n;

    let (precision, recall, f1) = match average {
        Average::Binary => class_scores(y_true, y_pred, 1.0),
        Average::Weighted => {
            let mut classes: Vec<f64> = y_true.to_vec();
            classes.sort_by(|a, b| a.total_cmp(b));
            classes.dedup();

            let mut precision = 0.0;
            let mut recall = 0.0;
            let mut f1 = 0.0;
            for class in classes {
                let support = y_true.iter().filter(|&&t| t == class).count() as f64;
                let (p, r, f) = class_scores(y_true, y_pred, class);
                let weight = support / n;
                precision += weight * p;
                recall += weight * r;
                f1 += weight * f;
            }
            (precision, recall, f1)
        }
    };

    Ok(ClassificationMetrics {
        accuracy,
        precision,
        recall,
        f1,
    })
}

/// Precision, recall and F1 for one class; zero-division scores 0
fn class_scores(y_true: &[f64], y_pred: &[f64], class: f64) -> (f64, f64, f64) {
    let mut tp = 0.0;
    let mut fp = 0.0;
    let mut fn_ = 0.0;
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t == class, p == class) {
            (true, true) => tp += 1.0,
            (false, true) => fp += 1.0,
            (true, false) => fn_ += 1.0,
            (false, false) => {}
        }
    }

    let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
    let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    (precision, recall, f1)
}

/// Compute regression metrics over value sequences
pub fn regression_metrics(y_true: &[f64], y_pred: &[f64]) -> Result<RegressionMetrics> {
    check_shapes(y_true, y_pred)?;

    let n = y_true.len() as f64;
    let mse = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / n;
    let mae = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / n;

    let residuals: Vec<f64> = y_true.iter().zip(y_pred).map(|(t, p)| t - p).collect();
    let var_true = variance(y_true);
    let evs = if var_true == 0.0 {
        0.0
    } else {
        1.0 - variance(&residuals) / var_true
    };

    Ok(RegressionMetrics { mse, mae, evs })
}

/// Population variance
fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_accuracy_is_exact_match_fraction() {
        let y_true = [1.0, 0.0, 1.0, 1.0];
        let y_pred = [1.0, 1.0, 1.0, 0.0];
        let m = classification_metrics(&y_true, &y_pred, Average::Binary).unwrap();
        assert_relative_eq!(m.accuracy, 0.5);
    }

    #[test]
    fn test_binary_scores() {
        // tp=2, fp=1, fn=1
        let y_true = [1.0, 0.0, 1.0, 1.0, 0.0];
        let y_pred = [1.0, 1.0, 1.0, 0.0, 0.0];
        let m = classification_metrics(&y_true, &y_pred, Average::Binary).unwrap();

        assert_relative_eq!(m.precision, 2.0 / 3.0);
        assert_relative_eq!(m.recall, 2.0 / 3.0);
        assert_relative_eq!(m.f1, 2.0 / 3.0);
    }

    #[test]
    fn test_zero_division_scores_zero() {
        // No positive predictions and no positive truths
        let y_true = [0.0, 0.0];
        let y_pred = [0.0, 0.0];
        let m = classification_metrics(&y_true, &y_pred, Average::Binary).unwrap();

        assert_relative_eq!(m.accuracy, 1.0);
        assert_relative_eq!(m.precision, 0.0);
        assert_relative_eq!(m.recall, 0.0);
        assert_relative_eq!(m.f1, 0.0);
    }

    #[test]
    fn test_weighted_average_perfect_prediction() {
        let y_true = [0.0, 0.0, 1.0, 1.0, 1.0];
        let m = classification_metrics(&y_true, &y_true, Average::Weighted).unwrap();
        assert_relative_eq!(m.precision, 1.0);
        assert_relative_eq!(m.recall, 1.0);
        assert_relative_eq!(m.f1, 1.0);
    }

    #[test]
    fn test_weighted_average_by_support() {
        // Class 1 (support 3) predicted perfectly; class 0 (support 1) missed
        let y_true = [1.0, 1.0, 1.0, 0.0];
        let y_pred = [1.0, 1.0, 1.0, 1.0];
        let m = classification_metrics(&y_true, &y_pred, Average::Weighted).unwrap();

        // class 0: p=0, r=0; class 1: p=3/4, r=1
        assert_relative_eq!(m.precision, 0.75 * 0.75);
        assert_relative_eq!(m.recall, 0.75);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        assert!(classification_metrics(&[1.0], &[1.0, 0.0], Average::Binary).is_err());
        assert!(classification_metrics(&[], &[], Average::Binary).is_err());
        assert!(regression_metrics(&[1.0], &[]).is_err());
    }

    #[test]
    fn test_regression_metrics() {
        let y_true = [1.0, 2.0, 3.0];
        let y_pred = [1.0, 2.0, 4.0];
        let m = regression_metrics(&y_true, &y_pred).unwrap();

        assert_relative_eq!(m.mse, 1.0 / 3.0);
        assert_relative_eq!(m.mae, 1.0 / 3.0);
    }

    #[test]
    fn test_evs_zero_when_truth_is_constant() {
        let y_true = [2.0, 2.0, 2.0];
        let y_pred = [1.0, 2.0, 3.0];
        let m = regression_metrics(&y_true, &y_pred).unwrap();
        assert_relative_eq!(m.evs, 0.0);
    }

    #[test]
    fn test_evs_perfect_prediction() {
        let y_true = [1.0, 2.0, 3.0];
        let m = regression_metrics(&y_true, &y_true).unwrap();
        assert_relative_eq!(m.evs, 1.0);
    }

    #[test]
    fn test_metric_set_entries_order() {
        let set = MetricSet {
            model: "sp500-direction".to_string(),
            stage: Stage::Staging,
            metrics: TaskMetrics::Classification(ClassificationMetrics {
                accuracy: 0.9,
                precision: 0.8,
                recall: 0.7,
                f1: 0.75,
            }),
        };
        let labels: Vec<&str> = set.entries().iter().map(|(k, _)| *k).collect();
        assert_eq!(labels, vec!["Accuracy", "Precision", "Recall", "F1 Score"]);
    }
}
