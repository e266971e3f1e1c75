//! Yahoo Finance data source integration
//!
//! Provides free access to historical daily OHLCV data.

use crate::data::sources::MarketDataSource;
use crate::error::{PipelineError, Result};
use crate::types::Bar;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/download";

/// Yahoo Finance data source (no API key required)
pub struct YahooFinanceSource {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct YahooRow {
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

impl YahooFinanceSource {
    /// Create a new Yahoo Finance data source
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| {
                PipelineError::DataUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    /// Fetch bars covering the last `days` calendar days
    pub async fn fetch_recent(&self, symbol: &str, days: i64) -> Result<Vec<Bar>> {
        let end = Utc::now().date_naive();
        let start = end - chrono::Duration::days(days);
        self.fetch_daily(symbol, start, end).await
    }

    fn parse_csv_data(&self, csv_text: &str) -> Result<Vec<Bar>> {
        let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
        let mut bars = Vec::new();

        for result in reader.deserialize() {
            let row: YahooRow = result
                .map_err(|e| PipelineError::DataUnavailable(format!("CSV parse error: {}", e)))?;

            let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
                .map_err(|e| PipelineError::DataUnavailable(format!("Date parse error: {}", e)))?;

            bars.push(Bar::new(
                date, row.open, row.high, row.low, row.close, row.volume,
            ));
        }

        Ok(bars)
    }
}

impl MarketDataSource for YahooFinanceSource {
    async fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>> {
        let period1 = start
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc().timestamp())
            .unwrap_or_default();
        let period2 = end
            .and_hms_opt(23, 59, 59)
            .map(|t| t.and_utc().timestamp())
            .unwrap_or_default();

        let url = format!(
            "{}/{}?period1={}&period2={}&interval=1d&events=history",
            YAHOO_BASE_URL, symbol, period1, period2
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            PipelineError::DataUnavailable(format!("HTTP request failed: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(PipelineError::DataUnavailable(format!(
                "Yahoo Finance returned error: {}",
                response.status()
            )));
        }

        let text = response.text().await.map_err(|e| {
            PipelineError::DataUnavailable(format!("Failed to read response: {}", e))
        })?;

        self.parse_csv_data(&text)
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}
