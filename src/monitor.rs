//! Production model monitoring
//!
//! The scheduled-job body: joins the served-prediction log against the
//! targets realized in the market, records the metrics and alerts by
//! email when accuracy drops under the configured limit.

use crate::alert::try_send_alert;
use crate::config::Settings;
use crate::data::sources::MarketDataSource;
use crate::error::{PipelineError, Result};
use crate::ml::metrics::{classification_metrics, Average, ClassificationMetrics, MetricSet, TaskMetrics};
use crate::ml::trainer::CLASSIFIER_MODEL;
use crate::store::{DocumentStore, METRIC_LIMIT, PREDICTIONS, PRODUCTION_METRICS_HISTORY};
use crate::types::{MetricLimit, PredictionRecord, Stage};
use chrono::{NaiveDate, Utc};
use hashbrown::HashMap;

/// Accuracy floor used when no metric limit has been stored
pub const DEFAULT_METRIC_LIMIT: f64 = 0.5;

/// Alert subject for degraded production accuracy
pub const ALERT_SUBJECT: &str = "ALERT - production model evaluation";

/// Calendar days of market data fetched to realize recent targets
const LOOKBACK_DAYS: i64 = 7;

/// Evaluate the production classifier against realized outcomes
pub async fn evaluate_production<S: MarketDataSource>(
    source: &S,
    store: &DocumentStore,
    settings: &Settings,
) -> Result<ClassificationMetrics> {
    let end = Utc::now().date_naive();
    let start = end - chrono::Duration::days(LOOKBACK_DAYS);
    let bars = source.fetch_daily(&settings.ticker, start, end).await?;
    if bars.is_empty() {
        return Err(PipelineError::DataUnavailable(format!(
            "no recent bars for {}",
            settings.ticker
        )));
    }

    // Next-day direction realized for every bar that has a successor
    let mut bars = bars;
    bars.sort_by_key(|b| b.date);
    let mut realized: HashMap<NaiveDate, f64> = HashMap::new();
    for pair in bars.windows(2) {
        realized.insert(pair[0].date, f64::from(pair[1].close > pair[0].close));
    }

    let predictions: Vec<PredictionRecord> = store.find_all(PREDICTIONS)?;

    // Inner join on calendar date; a prediction's label is its first output
    let mut y_true = Vec::new();
    let mut y_pred = Vec::new();
    for record in predictions
        .iter()
        .filter(|r| r.model == CLASSIFIER_MODEL)
    {
        let date = record.timestamp.date_naive();
        if let (Some(&actual), Some(&label)) = (realized.get(&date), record.predictions.first()) {
            y_true.push(actual);
            y_pred.push(label);
        }
    }

    if y_true.is_empty() {
        return Err(PipelineError::DataUnavailable(
            "no logged predictions overlap the realized window".to_string(),
        ));
    }

    let metrics = classification_metrics(&y_true, &y_pred, Average::Binary)?;
    store.insert(
        PRODUCTION_METRICS_HISTORY,
        &MetricSet {
            model: CLASSIFIER_MODEL.to_string(),
            stage: Stage::Production,
            metrics: TaskMetrics::Classification(metrics),
        },
    )?;

    let limit = store
        .find_latest::<MetricLimit>(METRIC_LIMIT)?
        .map(|l| l.value)
        .unwrap_or(DEFAULT_METRIC_LIMIT);

    log::info!(
        "production accuracy {:.2} over {} joined predictions (limit {:.2})",
        metrics.accuracy,
        y_true.len(),
        limit
    );

    if metrics.accuracy < limit {
        try_send_alert(
            settings.smtp.as_ref(),
            ALERT_SUBJECT,
            &format!(
                "The production model is not performing well. Accuracy is {:.2}, below the limit {:.2}.",
                metrics.accuracy, limit
            ),
        );
    }

    Ok(metrics)
}
