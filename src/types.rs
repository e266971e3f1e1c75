//! Core types and constants

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp type used throughout the library
pub type Timestamp = DateTime<Utc>;

/// Price type (using f64 for precision)
pub type Price = f64;

/// Quantity/volume type
pub type Quantity = f64;

/// Daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Quantity,
}

impl Bar {
    /// Create a new bar
    pub fn new(
        date: NaiveDate,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Quantity,
    ) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Lifecycle stage of a registered model version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Trained but not yet serving live traffic
    Staging,
    /// The version answering prediction requests
    Production,
    /// Superseded production version, kept for history
    Archived,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Staging => write!(f, "staging"),
            Stage::Production => write!(f, "production"),
            Stage::Archived => write!(f, "archived"),
        }
    }
}

/// Learning task a model is trained for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Classification,
    Regression,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Classification => write!(f, "classification"),
            TaskKind::Regression => write!(f, "regression"),
        }
    }
}

/// Append-only log entry for a served prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: uuid::Uuid,
    pub timestamp: Timestamp,
    pub model: String,
    /// Input feature vector, keyed by feature name
    pub input: BTreeMap<String, f64>,
    pub predictions: Vec<f64>,
}

/// Accuracy floor for production alerting; latest entry wins
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricLimit {
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Staging.to_string(), "staging");
        assert_eq!(Stage::Production.to_string(), "production");
        assert_eq!(Stage::Archived.to_string(), "archived");
    }

    #[test]
    fn test_stage_serde_lowercase() {
        let json = serde_json::to_string(&Stage::Production).unwrap();
        assert_eq!(json, "\"production\"");
        let back: Stage = serde_json::from_str("\"staging\"").unwrap();
        assert_eq!(back, Stage::Staging);
    }

    #[test]
    fn test_bar_creation() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let bar = Bar::new(date, 100.0, 105.0, 99.0, 103.0, 1000.0);
        assert_eq!(bar.close, 103.0);
        assert_eq!(bar.date, date);
    }
}
