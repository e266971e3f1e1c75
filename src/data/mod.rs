//! Market data handling: raw bars, typed frames, feature engineering,
//! splitting and drift validation

pub mod features;
pub mod frame;
pub mod sources;
pub mod split;
pub mod validate;

pub use features::FeatureBuilder;
pub use frame::{Column, ColumnType, Frame};
pub use sources::{InMemorySource, MarketDataSource, YahooFinanceSource};
pub use split::chronological_split;
pub use validate::{validate, ValidationReport};

use crate::error::Result;
use crate::types::Bar;
use chrono::NaiveDate;
use std::fs::OpenOptions;
use std::path::Path;

/// Append bars to a raw OHLCV CSV, writing the header only on creation
pub fn append_bars_csv(path: &Path, bars: &[Bar]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file_exists = path.is_file();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if !file_exists {
        writer.write_record(["Date", "Open", "High", "Low", "Close", "Volume"])?;
    }
    for bar in bars {
        writer.write_record([
            bar.date.format("%Y-%m-%d").to_string(),
            format!("{:?}", bar.open),
            format!("{:?}", bar.high),
            format!("{:?}", bar.low),
            format!("{:?}", bar.close),
            format!("{:?}", bar.volume),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a raw OHLCV CSV back into bars
pub fn read_bars_csv(path: &Path) -> Result<Vec<Bar>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut bars = Vec::new();
    for record in reader.deserialize() {
        let row: RawBarRow = record?;
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
            crate::error::PipelineError::SchemaMismatch(format!("bad date '{}': {}", row.date, e))
        })?;
        bars.push(Bar::new(
            date, row.open, row.high, row.low, row.close, row.volume,
        ));
    }
    Ok(bars)
}

#[derive(serde::Deserialize)]
struct RawBarRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume")]
    volume: f64,
}
