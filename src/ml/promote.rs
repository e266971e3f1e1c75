//! Staging-to-production promotion decisions
//!
//! Compares a newly trained staging model against the production
//! incumbent on the same held-out split and transitions the registry
//! accordingly. The designated comparison metric is precision for
//! classification and MSE for regression, both strict: a tie keeps the
//! incumbent. A failed evaluation aborts the decision and leaves the
//! production stage untouched.

use crate::data::features::PREDICTORS;
use crate::data::frame::Frame;
use crate::error::Result;
use crate::ml::forest::RandomForest;
use crate::ml::metrics::{
    classification_metrics, regression_metrics, Average, MetricSet, TaskMetrics,
};
use crate::registry::ModelRegistry;
use crate::report::write_metrics_report;
use crate::store::{DocumentStore, METRICS_HISTORY};
use crate::types::{Stage, TaskKind};
use std::path::PathBuf;

/// Decision taken for one model name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// No staging candidate exists; nothing to evaluate
    NoStaging,
    /// The staging candidate now holds production
    Promoted {
        version: u32,
        /// Version it displaced, if any
        superseded: Option<u32>,
    },
    /// The incumbent stays; the candidate remains staged for audit/retry
    Rejected { version: u32, incumbent: u32 },
}

/// Evaluates staged candidates against production incumbents
pub struct PromotionEvaluator<'a> {
    registry: &'a ModelRegistry,
    store: &'a DocumentStore,
    reports_dir: PathBuf,
}

impl<'a> PromotionEvaluator<'a> {
    pub fn new(
        registry: &'a ModelRegistry,
        store: &'a DocumentStore,
        reports_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            store,
            reports_dir: reports_dir.into(),
        }
    }

    /// Decide whether the staged version of `name` should replace the
    /// production incumbent, judged on the given held-out split.
    pub fn evaluate(&self, name: &str, task: TaskKind, test: &Frame) -> Result<PromotionOutcome> {
        let Some(candidate) = self.registry.latest(name, Stage::Staging)? else {
            log::info!("no staging model for '{name}'; nothing to evaluate");
            return Ok(PromotionOutcome::NoStaging);
        };

        let Some(incumbent) = self.registry.latest(name, Stage::Production)? else {
            self.registry
                .transition(name, candidate.version, Stage::Production)?;
            log::info!(
                "no production model for '{name}'; promoted v{} unconditionally",
                candidate.version
            );
            return Ok(PromotionOutcome::Promoted {
                version: candidate.version,
                superseded: None,
            });
        };

        let mut test = test.clone();
        test.sort_by_date("Date")?;
        // The split tail carries the row with no lookahead target
        test.drop_last_row();
        test.mean_fill();

        let x = test.feature_matrix(&PREDICTORS)?;
        let target_column = match task {
            TaskKind::Classification => "Target",
            TaskKind::Regression => "Tomorrow",
        };
        let y_true = test.required_f64(target_column)?;

        let candidate_model =
            RandomForest::from_json(&self.registry.load_artifact(&candidate)?)?;
        let incumbent_model =
            RandomForest::from_json(&self.registry.load_artifact(&incumbent)?)?;

        let candidate_pred = candidate_model.predict(&x);
        let incumbent_pred = incumbent_model.predict(&x);

        // Both metric sets are computed in full before any transition:
        // a failure here must leave the production stage untouched.
        let (candidate_metrics, promote) = match task {
            TaskKind::Classification => {
                let cand = classification_metrics(&y_true, &candidate_pred, Average::Weighted)?;
                let prod = classification_metrics(&y_true, &incumbent_pred, Average::Weighted)?;
                (
                    TaskMetrics::Classification(cand),
                    cand.precision > prod.precision,
                )
            }
            TaskKind::Regression => {
                let cand = regression_metrics(&y_true, &candidate_pred)?;
                let prod = regression_metrics(&y_true, &incumbent_pred)?;
                (TaskMetrics::Regression(cand), cand.mse < prod.mse)
            }
        };

        let metric_set = MetricSet {
            model: name.to_string(),
            stage: Stage::Staging,
            metrics: candidate_metrics,
        };
        write_metrics_report(
            &self.reports_dir.join(name).join("metrics.txt"),
            &metric_set,
        )?;
        self.store.insert(METRICS_HISTORY, &metric_set)?;

        if promote {
            self.registry
                .transition(name, candidate.version, Stage::Production)?;
            log::info!(
                "'{name}' v{} promoted to production over v{}",
                candidate.version,
                incumbent.version
            );
            Ok(PromotionOutcome::Promoted {
                version: candidate.version,
                superseded: Some(incumbent.version),
            })
        } else {
            log::info!(
                "'{name}' v{} rejected; production stays at v{}",
                candidate.version,
                incumbent.version
            );
            Ok(PromotionOutcome::Rejected {
                version: candidate.version,
                incumbent: incumbent.version,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::Column;
    use crate::ml::forest::{ForestConfig, RandomForest};
    use crate::types::Bar;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    struct World {
        registry: ModelRegistry,
        store: DocumentStore,
        _dir: tempfile::TempDir,
        reports: PathBuf,
    }

    fn world() -> World {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path().join("registry")).unwrap();
        let store = DocumentStore::open_in_memory().unwrap();
        let reports = dir.path().join("reports");
        World {
            registry,
            store,
            _dir: dir,
            reports,
        }
    }

    /// A forest that always answers with `label`
    fn constant_classifier(label: f64) -> Vec<u8> {
        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 1,
            min_samples_split: 2,
            bootstrap: false,
            ..Default::default()
        });
        let x: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64; 6]).collect();
        let y = vec![label; 4];
        forest.fit(&x, &y).unwrap();
        forest.to_json().unwrap()
    }

    /// Test frame whose targets alternate 1, 0, 1, 0, ...
    fn test_frame(n: u32) -> Frame {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars: Vec<Bar> = (0..n)
            .map(|i| {
                let date = start + chrono::Duration::days(i as i64);
                let close = if i % 2 == 0 { 100.0 } else { 110.0 };
                Bar::new(date, close, close + 1.0, close - 1.0, close, 1_000.0)
            })
            .collect();
        let aux: Vec<Bar> = bars
            .iter()
            .map(|b| Bar::new(b.date, 15_000.0, 0.0, 0.0, 0.0, 0.0))
            .collect();
        crate::data::features::FeatureBuilder::new()
            .build(&bars, &aux)
            .unwrap()
    }

    #[test]
    fn test_no_staging_is_a_noop() {
        let w = world();
        let evaluator = PromotionEvaluator::new(&w.registry, &w.store, &w.reports);

        let outcome = evaluator
            .evaluate("sp500-direction", TaskKind::Classification, &test_frame(10))
            .unwrap();

        assert_eq!(outcome, PromotionOutcome::NoStaging);
    }

    #[test]
    fn test_first_candidate_promotes_unconditionally() {
        let w = world();
        w.registry
            .register("sp500-direction", TaskKind::Classification, &constant_classifier(0.0))
            .unwrap();

        let evaluator = PromotionEvaluator::new(&w.registry, &w.store, &w.reports);
        let outcome = evaluator
            .evaluate("sp500-direction", TaskKind::Classification, &test_frame(10))
            .unwrap();

        assert_eq!(
            outcome,
            PromotionOutcome::Promoted {
                version: 1,
                superseded: None
            }
        );
        assert!(w
            .registry
            .latest("sp500-direction", Stage::Production)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_better_candidate_is_promoted() {
        let w = world();
        // Incumbent always predicts 0: weighted precision over the
        // alternating targets scores only the 0 class
        let v1 = w
            .registry
            .register("sp500-direction", TaskKind::Classification, &constant_classifier(0.0))
            .unwrap();
        w.registry
            .transition("sp500-direction", v1.version, Stage::Production)
            .unwrap();
        // Candidate always predicts 1: the 1 class dominates the
        // alternating targets after the trailing row is dropped
        w.registry
            .register("sp500-direction", TaskKind::Classification, &constant_classifier(1.0))
            .unwrap();

        let evaluator = PromotionEvaluator::new(&w.registry, &w.store, &w.reports);
        let outcome = evaluator
            .evaluate("sp500-direction", TaskKind::Classification, &test_frame(10))
            .unwrap();

        assert_eq!(
            outcome,
            PromotionOutcome::Promoted {
                version: 2,
                superseded: Some(1)
            }
        );

        let production = w
            .registry
            .latest("sp500-direction", Stage::Production)
            .unwrap()
            .unwrap();
        assert_eq!(production.version, 2);
        assert_eq!(
            w.registry
                .latest("sp500-direction", Stage::Archived)
                .unwrap()
                .unwrap()
                .version,
            1
        );
    }

    #[test]
    fn test_equal_candidate_is_rejected() {
        let w = world();
        let v1 = w
            .registry
            .register("sp500-direction", TaskKind::Classification, &constant_classifier(1.0))
            .unwrap();
        w.registry
            .transition("sp500-direction", v1.version, Stage::Production)
            .unwrap();
        // Same behavior as the incumbent: metrics tie, production stays
        w.registry
            .register("sp500-direction", TaskKind::Classification, &constant_classifier(1.0))
            .unwrap();

        let evaluator = PromotionEvaluator::new(&w.registry, &w.store, &w.reports);
        let outcome = evaluator
            .evaluate("sp500-direction", TaskKind::Classification, &test_frame(10))
            .unwrap();

        assert_eq!(
            outcome,
            PromotionOutcome::Rejected {
                version: 2,
                incumbent: 1
            }
        );
        assert_eq!(
            w.registry
                .latest("sp500-direction", Stage::Production)
                .unwrap()
                .unwrap()
                .version,
            1
        );
        // Rejected candidate remains staged for audit
        assert_eq!(
            w.registry
                .latest("sp500-direction", Stage::Staging)
                .unwrap()
                .unwrap()
                .version,
            2
        );
    }

    #[test]
    fn test_failed_evaluation_leaves_production_untouched() {
        let w = world();
        let v1 = w
            .registry
            .register("sp500-direction", TaskKind::Classification, &constant_classifier(1.0))
            .unwrap();
        w.registry
            .transition("sp500-direction", v1.version, Stage::Production)
            .unwrap();
        w.registry
            .register("sp500-direction", TaskKind::Classification, &constant_classifier(0.0))
            .unwrap();

        // A test frame with no usable rows: evaluation must abort
        let empty = Frame::with_columns(vec![
            Column::date("Date", vec![]),
            Column::float("Close", vec![]),
        ])
        .unwrap();

        let evaluator = PromotionEvaluator::new(&w.registry, &w.store, &w.reports);
        let result = evaluator.evaluate("sp500-direction", TaskKind::Classification, &empty);

        assert!(result.is_err());
        assert_eq!(
            w.registry
                .latest("sp500-direction", Stage::Production)
                .unwrap()
                .unwrap()
                .version,
            1
        );
    }

    #[test]
    fn test_report_and_history_written_on_comparison() {
        let w = world();
        let v1 = w
            .registry
            .register("sp500-price", TaskKind::Regression, &constant_regressor(105.0))
            .unwrap();
        w.registry
            .transition("sp500-price", v1.version, Stage::Production)
            .unwrap();
        w.registry
            .register("sp500-price", TaskKind::Regression, &constant_regressor(104.0))
            .unwrap();

        let evaluator = PromotionEvaluator::new(&w.registry, &w.store, &w.reports);
        evaluator
            .evaluate("sp500-price", TaskKind::Regression, &test_frame(10))
            .unwrap();

        let report = w.reports.join("sp500-price").join("metrics.txt");
        let text = std::fs::read_to_string(report).unwrap();
        assert!(text.starts_with("Model: sp500-price"));
        assert!(text.contains("MSE: "));

        let history: Vec<MetricSet> = w.store.find_all(METRICS_HISTORY).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].model, "sp500-price");
    }

    /// A forest that always answers with `value`
    fn constant_regressor(value: f64) -> Vec<u8> {
        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 1,
            min_samples_split: 2,
            bootstrap: false,
            task: TaskKind::Regression,
            ..Default::default()
        });
        let x: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64; 6]).collect();
        let y = vec![value; 4];
        forest.fit(&x, &y).unwrap();
        forest.to_json().unwrap()
    }
}
