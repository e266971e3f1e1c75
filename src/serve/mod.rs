//! HTTP serving layer
//!
//! Serves predictions from the production models plus the monitoring
//! read endpoints. Every route answers HTTP 200 with JSON; failures are
//! reported as an `{"error": ...}` payload rather than a protocol-level
//! error status. Handlers keep no shared mutable state beyond appends to
//! the document store.

use crate::config::Settings;
use crate::data::sources::MarketDataSource;
use crate::error::{PipelineError, Result};
use crate::ml::forest::RandomForest;
use crate::ml::metrics::{MetricSet, TaskMetrics};
use crate::ml::trainer::{CLASSIFIER_MODEL, REGRESSOR_MODEL};
use crate::data::features::PREDICTORS;
use crate::data::validate::ValidationReport;
use crate::store::{
    DocumentStore, METRICS_HISTORY, METRIC_LIMIT, PREDICTIONS, PRODUCTION_METRICS_HISTORY,
    VALIDATION_RESULTS,
};
use crate::registry::ModelRegistry;
use crate::types::{MetricLimit, PredictionRecord, Stage, TaskKind};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared handler state, built once at startup
pub struct AppState<S> {
    pub settings: Settings,
    pub registry: ModelRegistry,
    pub store: DocumentStore,
    pub source: S,
}

/// Build the router over the shared state
pub fn router<S: MarketDataSource + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/predict", get(predict::<S>))
        .route("/predict/regression", get(predict_regression::<S>))
        .route("/historical-prices", get(historical_prices::<S>))
        .route("/latest-validation-result", get(latest_validation_result::<S>))
        .route("/metrics-history", get(metrics_history::<S>))
        .route(
            "/production-metrics-history",
            get(production_metrics_history::<S>),
        )
        .route("/metric-limit", post(create_metric_limit::<S>))
        .route("/metric-limit/latest", get(latest_metric_limit::<S>))
        .with_state(state)
}

/// Bind and serve until shutdown
pub async fn run<S: MarketDataSource + 'static>(state: Arc<AppState<S>>) -> Result<()> {
    let addr = state.settings.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("serving on {addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn respond(result: Result<Value>) -> Json<Value> {
    match result {
        Ok(value) => Json(value),
        Err(e) => Json(json!({ "error": e.to_string() })),
    }
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "sp500-mlops serving layer" }))
}

async fn predict<S: MarketDataSource>(State(state): State<Arc<AppState<S>>>) -> Json<Value> {
    respond(
        predict_inner(&state, TaskKind::Classification)
            .await
            .map(|p| json!({ "prediction": p })),
    )
}

async fn predict_regression<S: MarketDataSource>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Value> {
    respond(
        predict_inner(&state, TaskKind::Regression)
            .await
            .map(|p| json!({ "prediction": p })),
    )
}

async fn predict_inner<S: MarketDataSource>(
    state: &AppState<S>,
    task: TaskKind,
) -> Result<Vec<f64>> {
    let end = Utc::now().date_naive();
    let start = end - chrono::Duration::days(7);

    let bars = state
        .source
        .fetch_daily(&state.settings.ticker, start, end)
        .await?;
    let bar = bars
        .iter()
        .max_by_key(|b| b.date)
        .ok_or_else(|| {
            PipelineError::DataUnavailable(
                "no data fetched from the market data source".to_string(),
            )
        })?;

    let aux = state
        .source
        .fetch_daily(&state.settings.aux_ticker, start, end)
        .await?;
    let aux_open = aux
        .iter()
        .find(|b| b.date == bar.date)
        .map(|b| b.open)
        .ok_or_else(|| {
            PipelineError::DataUnavailable(format!(
                "no auxiliary index data for {}",
                bar.date
            ))
        })?;

    // Keep the ordering aligned with the predictor schema
    let input = vec![bar.close, bar.volume, bar.open, bar.high, bar.low, aux_open];

    let name = match task {
        TaskKind::Classification => CLASSIFIER_MODEL,
        TaskKind::Regression => REGRESSOR_MODEL,
    };
    let record = state
        .registry
        .latest(name, Stage::Production)?
        .ok_or_else(|| {
            PipelineError::RegistryError(format!(
                "no production model registered for '{name}'"
            ))
        })?;
    let forest = RandomForest::from_json(&state.registry.load_artifact(&record)?)?;

    let predictions = forest.predict(std::slice::from_ref(&input));

    state.store.insert(
        PREDICTIONS,
        &PredictionRecord {
            id: uuid::Uuid::new_v4(),
            timestamp: Utc::now(),
            model: name.to_string(),
            input: PREDICTORS
                .iter()
                .map(|n| n.to_string())
                .zip(input.iter().copied())
                .collect::<BTreeMap<String, f64>>(),
            predictions: predictions.clone(),
        },
    )?;

    Ok(predictions)
}

async fn historical_prices<S: MarketDataSource>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Value> {
    let end = Utc::now().date_naive();
    let start = end - chrono::Duration::days(30);
    respond(
        state
            .source
            .fetch_daily(&state.settings.ticker, start, end)
            .await
            .map(|bars| {
                let prices: Vec<Value> = bars
                    .iter()
                    .map(|b| {
                        json!({
                            "date": b.date.format("%Y-%m-%d").to_string(),
                            "close": b.close,
                        })
                    })
                    .collect();
                json!({ "prices": prices })
            }),
    )
}

async fn latest_validation_result<S>(State(state): State<Arc<AppState<S>>>) -> Json<Value>
where
    S: MarketDataSource,
{
    respond(
        state
            .store
            .find_latest::<ValidationReport>(VALIDATION_RESULTS)
            .and_then(|report| match report {
                Some(report) => Ok(serde_json::to_value(report)?),
                None => Err(PipelineError::StoreError(
                    "no validation results recorded".to_string(),
                )),
            }),
    )
}

async fn metrics_history<S: MarketDataSource>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Value> {
    respond(
        state
            .store
            .find_all::<MetricSet>(METRICS_HISTORY)
            .map(partition_history),
    )
}

async fn production_metrics_history<S: MarketDataSource>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Value> {
    respond(
        state
            .store
            .find_all::<MetricSet>(PRODUCTION_METRICS_HISTORY)
            .map(partition_history),
    )
}

fn partition_history(sets: Vec<MetricSet>) -> Value {
    let (classification, regression): (Vec<MetricSet>, Vec<MetricSet>) = sets
        .into_iter()
        .partition(|s| matches!(s.metrics, TaskMetrics::Classification(_)));
    json!({
        "classification": classification,
        "regression": regression,
    })
}

async fn create_metric_limit<S: MarketDataSource>(
    State(state): State<Arc<AppState<S>>>,
    Json(limit): Json<MetricLimit>,
) -> Json<Value> {
    respond(
        state
            .store
            .insert(METRIC_LIMIT, &limit)
            .map(|()| json!({ "message": "Metric limit added successfully" })),
    )
}

async fn latest_metric_limit<S: MarketDataSource>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Value> {
    respond(
        state
            .store
            .find_latest::<MetricLimit>(METRIC_LIMIT)
            .and_then(|limit| match limit {
                Some(limit) => Ok(serde_json::to_value(limit)?),
                None => Err(PipelineError::StoreError(
                    "no metric limit set".to_string(),
                )),
            }),
    )
}
