//! Chronological train/test splitting
//!
//! The split boundary is strictly chronological: the most recent rows are
//! held out so evaluation never sees the past predicting the future.

use crate::data::frame::Frame;
use crate::error::Result;

/// Fraction of rows reserved for the held-out test split
pub const TEST_FRACTION: f64 = 0.1;

/// Sort by date ascending and reserve the last `floor(fraction * n)` rows
/// as the test split. No shuffling.
pub fn chronological_split(frame: &Frame, fraction: f64) -> Result<(Frame, Frame)> {
    let mut sorted = frame.clone();
    sorted.sort_by_date("Date")?;

    let n = sorted.n_rows();
    let n_test = (n as f64 * fraction).floor() as usize;
    let boundary = n - n_test;

    let train = sorted.slice_rows(0, boundary);
    let test = sorted.slice_rows(boundary, n);
    Ok((train, test))
}
