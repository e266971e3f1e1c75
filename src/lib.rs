//! # sp500-mlops
//!
//! An MLOps pipeline for S&P 500 next-day prediction: fetch daily market
//! data, engineer features, train a direction classifier and a price
//! regressor, promote them through a staging/production registry, serve
//! predictions over HTTP and monitor drift and live performance.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sp500_mlops::prelude::*;
//!
//! # fn run(bars: Vec<Bar>, nasdaq: Vec<Bar>) -> sp500_mlops::error::Result<()> {
//! let frame = FeatureBuilder::new().build(&bars, &nasdaq)?;
//! let (train, test) = chronological_split(&frame, 0.1)?;
//!
//! let registry = ModelRegistry::open("models/registry")?;
//! train_and_register(&registry, &train, &TrainerConfig::default())?;
//! # Ok(())
//! # }
//! ```

pub mod alert;
pub mod config;
pub mod data;
pub mod error;
pub mod ml;
pub mod monitor;
pub mod registry;
pub mod report;
pub mod serve;
pub mod store;
pub mod types;

pub mod prelude {
    //! Commonly used types and functions
    pub use crate::config::Settings;
    pub use crate::data::features::FeatureBuilder;
    pub use crate::data::frame::{Column, ColumnType, Frame};
    pub use crate::data::sources::{InMemorySource, MarketDataSource, YahooFinanceSource};
    pub use crate::data::split::chronological_split;
    pub use crate::data::validate::{validate, ValidationReport};
    pub use crate::error::{PipelineError, Result};
    pub use crate::ml::forest::RandomForest;
    pub use crate::ml::metrics::{Average, MetricSet};
    pub use crate::ml::promote::{PromotionEvaluator, PromotionOutcome};
    pub use crate::ml::trainer::{train_and_register, TrainerConfig};
    pub use crate::registry::ModelRegistry;
    pub use crate::store::DocumentStore;
    pub use crate::types::{Bar, Stage, TaskKind};
}
