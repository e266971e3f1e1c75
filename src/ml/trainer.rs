//! Model training and registration
//!
//! Fits the direction classifier and the next-price regressor on the
//! feature frame and registers both artifacts at stage staging. The
//! promotion evaluator decides separately whether either one reaches
//! production.

use crate::data::features::PREDICTORS;
use crate::data::frame::Frame;
use crate::error::Result;
use crate::ml::forest::{ForestConfig, RandomForest};
use crate::registry::{ModelRegistry, ModelVersion};
use crate::types::TaskKind;

/// Registered name of the next-day direction classifier
pub const CLASSIFIER_MODEL: &str = "sp500-direction";
/// Registered name of the next-day price regressor
pub const REGRESSOR_MODEL: &str = "sp500-price";

/// Hyperparameters shared by both forests
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 10,
            min_samples_split: 50,
            min_samples_leaf: 2,
            seed: 1,
        }
    }
}

impl TrainerConfig {
    fn forest_config(&self, task: TaskKind) -> ForestConfig {
        ForestConfig {
            n_trees: self.n_trees,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: None,
            bootstrap: true,
            seed: self.seed,
            task,
        }
    }
}

/// The two staged versions produced by one training run
#[derive(Debug, Clone)]
pub struct TrainedModels {
    pub classifier: ModelVersion,
    pub regressor: ModelVersion,
}

/// Train both models on the feature frame and register them at staging
pub fn train_and_register(
    registry: &ModelRegistry,
    frame: &Frame,
    config: &TrainerConfig,
) -> Result<TrainedModels> {
    let mut frame = frame.clone();
    frame.sort_by_date("Date")?;
    // The final row has no lookahead target
    frame.drop_last_row();
    frame.mean_fill();

    let x = frame.feature_matrix(&PREDICTORS)?;
    let y_direction = frame.required_f64("Target")?;
    let y_price = frame.required_f64("Tomorrow")?;

    let mut classifier = RandomForest::new(config.forest_config(TaskKind::Classification));
    classifier.fit(&x, &y_direction)?;

    let mut regressor = RandomForest::new(config.forest_config(TaskKind::Regression));
    regressor.fit(&x, &y_price)?;

    let classifier_version = registry.register(
        CLASSIFIER_MODEL,
        TaskKind::Classification,
        &classifier.to_json()?,
    )?;
    let regressor_version =
        registry.register(REGRESSOR_MODEL, TaskKind::Regression, &regressor.to_json()?)?;

    log::info!(
        "trained {} v{} and {} v{} on {} rows",
        CLASSIFIER_MODEL,
        classifier_version.version,
        REGRESSOR_MODEL,
        regressor_version.version,
        x.len()
    );

    Ok(TrainedModels {
        classifier: classifier_version,
        regressor: regressor_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::features::FeatureBuilder;
    use crate::types::{Bar, Stage};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    pub(crate) fn synthetic_frame(n: u32) -> Frame {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let main: Vec<Bar> = (0..n)
            .map(|i| {
                let date = start + chrono::Duration::days(i as i64);
                let close = 100.0 + (i as f64 * 0.7).sin() * 10.0 + i as f64 * 0.05;
                Bar::new(date, close - 0.5, close + 1.0, close - 1.0, close, 1_000.0)
            })
            .collect();
        let aux: Vec<Bar> = main
            .iter()
            .map(|b| Bar::new(b.date, b.open * 10.0, 0.0, 0.0, 0.0, 0.0))
            .collect();
        FeatureBuilder::new().build(&main, &aux).unwrap()
    }

    fn small_config() -> TrainerConfig {
        TrainerConfig {
            n_trees: 5,
            min_samples_split: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_training_registers_both_models_at_staging() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();

        let trained =
            train_and_register(&registry, &synthetic_frame(60), &small_config()).unwrap();

        assert_eq!(trained.classifier.stage, Stage::Staging);
        assert_eq!(trained.regressor.stage, Stage::Staging);
        assert_eq!(trained.classifier.task, TaskKind::Classification);
        assert_eq!(trained.regressor.task, TaskKind::Regression);
    }

    #[test]
    fn test_artifacts_are_loadable_forests() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();

        let trained =
            train_and_register(&registry, &synthetic_frame(60), &small_config()).unwrap();

        let bytes = registry.load_artifact(&trained.classifier).unwrap();
        let forest = RandomForest::from_json(&bytes).unwrap();
        assert_eq!(forest.task(), TaskKind::Classification);

        let prediction = forest.predict_one(&[100.0, 1000.0, 99.5, 101.0, 99.0, 1000.0]);
        assert!(prediction == 0.0 || prediction == 1.0);
    }
}
