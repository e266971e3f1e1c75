//! Model training, evaluation and promotion

pub mod forest;
pub mod metrics;
pub mod promote;
pub mod trainer;

pub use forest::{DecisionTree, ForestConfig, RandomForest, TreeConfig};
pub use metrics::{
    classification_metrics, regression_metrics, Average, ClassificationMetrics, MetricSet,
    RegressionMetrics, TaskMetrics,
};
pub use promote::{PromotionEvaluator, PromotionOutcome};
pub use trainer::{train_and_register, TrainedModels, TrainerConfig, CLASSIFIER_MODEL, REGRESSOR_MODEL};
