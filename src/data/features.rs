//! Feature engineering for the daily S&P 500 series
//!
//! Turns raw OHLCV bars into the fixed feature/target schema the models
//! train on: a next-day price (`Tomorrow`), a next-day direction label
//! (`Target`), rolling close-to-mean ratios and lagged up-day trend sums
//! over a set of horizons, and the Nasdaq open joined by date.

use crate::data::frame::{Column, Frame};
use crate::error::Result;
use crate::types::Bar;
use chrono::NaiveDate;
use hashbrown::HashMap;
use std::collections::VecDeque;

/// Rolling horizons, in trading days
pub const HORIZONS: [usize; 5] = [2, 5, 60, 250, 1000];

/// Predictor columns used by both models
pub const PREDICTORS: [&str; 6] = ["Close", "Volume", "Open", "High", "Low", "Open_Nasdaq"];

/// Rows at or before this date are discarded before feature computation
pub fn epoch_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 1, 1).expect("valid cutoff date")
}

/// Builds the model-ready feature frame from raw bars
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    cutoff: NaiveDate,
}

impl FeatureBuilder {
    pub fn new() -> Self {
        Self {
            cutoff: epoch_cutoff(),
        }
    }

    /// Override the history cutoff (strictly-after filter)
    pub fn with_cutoff(cutoff: NaiveDate) -> Self {
        Self { cutoff }
    }

    /// Build the feature frame; `aux` supplies the auxiliary index bars
    /// joined by date as `Open_Nasdaq`
    pub fn build(&self, bars: &[Bar], aux: &[Bar]) -> Result<Frame> {
        let mut bars: Vec<Bar> = bars
            .iter()
            .filter(|b| b.date > self.cutoff)
            .cloned()
            .collect();
        bars.sort_by_key(|b| b.date);

        let n = bars.len();
        let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        // One-row lookahead: undefined on the final row
        let tomorrow: Vec<Option<f64>> = (0..n)
            .map(|i| closes.get(i + 1).copied())
            .collect();
        let target: Vec<Option<i64>> = (0..n)
            .map(|i| tomorrow[i].map(|t| i64::from(t > closes[i])))
            .collect();

        let aux_open: HashMap<NaiveDate, f64> =
            aux.iter().map(|b| (b.date, b.open)).collect();

        let mut frame = Frame::with_columns(vec![
            Column::date("Date", dates.clone()),
            Column::float("Open", bars.iter().map(|b| Some(b.open)).collect()),
            Column::float("High", bars.iter().map(|b| Some(b.high)).collect()),
            Column::float("Low", bars.iter().map(|b| Some(b.low)).collect()),
            Column::float("Close", closes.iter().map(|&c| Some(c)).collect()),
            Column::float("Volume", bars.iter().map(|b| Some(b.volume)).collect()),
            Column::float("Tomorrow", tomorrow),
            Column::int("Target", target.clone()),
        ])?;

        // Shift by one row so the trend window never sees today's outcome
        let mut lagged_target: Vec<Option<i64>> = Vec::with_capacity(n);
        if n > 0 {
            lagged_target.push(None);
            lagged_target.extend(target.iter().take(n - 1).copied());
        }

        for horizon in HORIZONS {
            let means = rolling_mean(horizon, &closes);
            let ratios: Vec<Option<f64>> = means
                .iter()
                .enumerate()
                .map(|(i, m)| m.map(|m| closes[i] / m))
                .collect();
            frame.push_column(Column::float(format!("Close_Ratio_{horizon}"), ratios))?;

            let trend = rolling_sum(horizon, &lagged_target);
            frame.push_column(Column::int(format!("Trend_{horizon}"), trend))?;
        }

        frame.push_column(Column::float(
            "Open_Nasdaq",
            dates.iter().map(|d| aux_open.get(d).copied()).collect(),
        ))?;

        Ok(frame)
    }
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolling mean over a fixed window; None until the window is full
fn rolling_mean(window: usize, values: &[f64]) -> Vec<Option<f64>> {
    let mut buffer: VecDeque<f64> = VecDeque::with_capacity(window);
    values
        .iter()
        .map(|&value| {
            buffer.push_back(value);
            if buffer.len() > window {
                buffer.pop_front();
            }
            if buffer.len() == window {
                Some(buffer.iter().sum::<f64>() / window as f64)
            } else {
                None
            }
        })
        .collect()
}

/// Rolling sum over nullable cells; a null anywhere in the window, or an
/// unfilled window, yields None
fn rolling_sum(window: usize, values: &[Option<i64>]) -> Vec<Option<i64>> {
    let mut buffer: VecDeque<Option<i64>> = VecDeque::with_capacity(window);
    values
        .iter()
        .map(|&value| {
            buffer.push_back(value);
            if buffer.len() > window {
                buffer.pop_front();
            }
            if buffer.len() == window {
                buffer.iter().copied().collect::<Option<Vec<i64>>>()
                    .map(|cells| cells.iter().sum())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    fn bar(date: NaiveDate, close: f64) -> Bar {
        Bar::new(date, close, close + 1.0, close - 1.0, close, 1000.0)
    }

    #[test]
    fn test_target_lookahead() {
        // Close = [100, 105, 102] -> Target = [1, 0, null]
        let bars = vec![
            bar(day(1), 100.0),
            bar(day(2), 105.0),
            bar(day(3), 102.0),
        ];

        let frame = FeatureBuilder::new().build(&bars, &[]).unwrap();

        assert_eq!(
            frame.column("Target").unwrap().as_ints().unwrap(),
            &[Some(1), Some(0), None]
        );
    }

    #[test]
    fn test_target_tie_is_zero() {
        let bars = vec![bar(day(1), 100.0), bar(day(2), 100.0)];
        let frame = FeatureBuilder::new().build(&bars, &[]).unwrap();
        assert_eq!(
            frame.column("Target").unwrap().as_ints().unwrap()[0],
            Some(0)
        );
    }

    #[test]
    fn test_close_ratio_warm_up() {
        let bars = vec![
            bar(day(1), 100.0),
            bar(day(2), 110.0),
            bar(day(3), 120.0),
        ];
        let frame = FeatureBuilder::new().build(&bars, &[]).unwrap();

        let ratios = frame.column("Close_Ratio_2").unwrap().as_f64();
        assert_eq!(ratios[0], None);
        // 110 / mean(100, 110)
        assert_relative_eq!(ratios[1].unwrap(), 110.0 / 105.0, epsilon = 1e-12);
        assert_relative_eq!(ratios[2].unwrap(), 120.0 / 115.0, epsilon = 1e-12);
    }

    #[test]
    fn test_trend_is_lagged() {
        // Closes rise, fall, rise, rise -> Target = [1, 0, 1, 1, null]
        let closes = [100.0, 105.0, 102.0, 104.0, 106.0];
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| bar(day(i as u32 + 1), c))
            .collect();

        let frame = FeatureBuilder::new().build(&bars, &[]).unwrap();
        let trend = frame.column("Trend_2").unwrap().as_ints().unwrap().to_vec();

        // Window of 2 over the shifted targets [null, 1, 0, 1, 1]
        assert_eq!(trend, vec![None, None, Some(1), Some(1), Some(2)]);
    }

    #[test]
    fn test_aux_join_by_date() {
        let bars = vec![bar(day(1), 100.0), bar(day(2), 101.0)];
        let aux = vec![bar(day(2), 15_000.0)];

        let frame = FeatureBuilder::new().build(&bars, &aux).unwrap();
        let nasdaq = frame.column("Open_Nasdaq").unwrap().as_f64();

        assert_eq!(nasdaq[0], None);
        assert_eq!(nasdaq[1], Some(15_000.0));
    }

    #[test]
    fn test_cutoff_filters_old_rows() {
        let old = bar(NaiveDate::from_ymd_opt(1989, 6, 1).unwrap(), 50.0);
        let boundary = bar(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(), 60.0);
        let kept = bar(NaiveDate::from_ymd_opt(1990, 1, 2).unwrap(), 70.0);

        let frame = FeatureBuilder::new()
            .build(&[old, boundary, kept], &[])
            .unwrap();

        assert_eq!(frame.n_rows(), 1);
        assert_eq!(frame.required_f64("Close").unwrap(), vec![70.0]);
    }

    #[test]
    fn test_column_order_is_stable() {
        let bars = vec![bar(day(1), 100.0), bar(day(2), 101.0)];
        let frame = FeatureBuilder::new().build(&bars, &[]).unwrap();

        let names = frame.column_names();
        assert_eq!(&names[..8], &[
            "Date", "Open", "High", "Low", "Close", "Volume", "Tomorrow", "Target"
        ]);
        assert_eq!(names[8], "Close_Ratio_2");
        assert_eq!(names[9], "Trend_2");
        assert_eq!(*names.last().unwrap(), "Open_Nasdaq");
    }
}
