//! Market data providers
//!
//! The pipeline treats the market data provider as an external
//! collaborator behind [`MarketDataSource`]: Yahoo Finance for live use,
//! an in-memory source for tests and offline runs.

pub mod yahoo;

pub use yahoo::YahooFinanceSource;

use crate::error::Result;
use crate::types::Bar;
use chrono::NaiveDate;

/// Trait for daily market data providers
pub trait MarketDataSource: Send + Sync {
    /// Fetch daily bars for a symbol over an inclusive date range
    fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl std::future::Future<Output = Result<Vec<Bar>>> + Send;

    /// Get the source name
    fn name(&self) -> &str;
}

/// Canned bars keyed by symbol, for tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    bars: hashbrown::HashMap<String, Vec<Bar>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add bars for a symbol
    pub fn add_bars(&mut self, symbol: &str, bars: Vec<Bar>) {
        self.bars.entry(symbol.to_string()).or_default().extend(bars);
    }
}

impl MarketDataSource for InMemorySource {
    async fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>> {
        Ok(self
            .bars
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start && b.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_range_filter() {
        let day = |n| NaiveDate::from_ymd_opt(2024, 1, n).unwrap();
        let mut source = InMemorySource::new();
        source.add_bars(
            "^GSPC",
            (1..=5)
                .map(|n| Bar::new(day(n), 100.0, 105.0, 99.0, 103.0, 1000.0))
                .collect(),
        );

        let bars = futures_block_on(source.fetch_daily("^GSPC", day(2), day(4)));
        assert_eq!(bars.unwrap().len(), 3);

        let none = futures_block_on(source.fetch_daily("^IXIC", day(2), day(4)));
        assert!(none.unwrap().is_empty());
    }

    fn futures_block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }
}
