//! Decision tree and random forest models
//!
//! CART-style trees (gini impurity for direction classification, MSE for
//! price regression) combined into seeded bootstrap forests. Fitted
//! forests serialize to JSON, which is the portable artifact format the
//! model registry stores and the serving layer loads back.

use crate::error::{PipelineError, Result};
use crate::types::TaskKind;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth of the tree
    pub max_depth: usize,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples in a leaf node
    pub min_samples_leaf: usize,
    /// Maximum features to consider per split (None = all)
    pub max_features: Option<usize>,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Learning task
    pub task: TaskKind,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 50,
            min_samples_leaf: 2,
            max_features: None,
            seed: 1,
            task: TaskKind::Classification,
        }
    }
}

/// Tree node; leaves carry the prediction value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    feature_idx: Option<usize>,
    threshold: Option<f64>,
    value: f64,
    /// Share of positive labels at this node (classification only)
    positive_rate: Option<f64>,
    left: Option<Box<TreeNode>>,
    right: Option<Box<TreeNode>>,
}

impl TreeNode {
    fn leaf(value: f64, positive_rate: Option<f64>) -> Self {
        Self {
            feature_idx: None,
            threshold: None,
            value,
            positive_rate,
            left: None,
            right: None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// A single decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    config: TreeConfig,
    root: Option<TreeNode>,
}

impl DecisionTree {
    pub fn new(config: TreeConfig) -> Self {
        Self { config, root: None }
    }

    /// Fit the tree on a row-major feature matrix and labels
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        if x.len() != y.len() || x.is_empty() {
            return Err(PipelineError::ShapeMismatch {
                left: x.len(),
                right: y.len(),
            });
        }
        let indices: Vec<usize> = (0..x.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut rng));
        Ok(())
    }

    fn build_tree(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let labels: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let impurity = self.impurity(&labels);

        if depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split
            || impurity < 1e-10
        {
            return self.make_leaf(&labels);
        }

        match self.find_best_split(x, y, indices, rng) {
            Some((feature_idx, threshold, left_idx, right_idx)) => {
                if left_idx.len() < self.config.min_samples_leaf
                    || right_idx.len() < self.config.min_samples_leaf
                {
                    return self.make_leaf(&labels);
                }

                let left = self.build_tree(x, y, &left_idx, depth + 1, rng);
                let right = self.build_tree(x, y, &right_idx, depth + 1, rng);

                TreeNode {
                    feature_idx: Some(feature_idx),
                    threshold: Some(threshold),
                    value: mean(&labels),
                    positive_rate: None,
                    left: Some(Box::new(left)),
                    right: Some(Box::new(right)),
                }
            }
            None => self.make_leaf(&labels),
        }
    }

    fn make_leaf(&self, labels: &[f64]) -> TreeNode {
        match self.config.task {
            TaskKind::Regression => TreeNode::leaf(mean(labels), None),
            TaskKind::Classification => {
                let rate = positive_rate(labels);
                let majority = if rate > 0.5 { 1.0 } else { 0.0 };
                TreeNode::leaf(majority, Some(rate))
            }
        }
    }

    fn impurity(&self, labels: &[f64]) -> f64 {
        match self.config.task {
            TaskKind::Regression => mse_impurity(labels),
            TaskKind::Classification => gini(labels),
        }
    }

    #[allow(clippy::type_complexity)]
    fn find_best_split(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64, Vec<usize>, Vec<usize>)> {
        let n_features = x.first().map(Vec::len).unwrap_or(0);
        let max_features = self.config.max_features.unwrap_or(n_features);

        let mut feature_indices: Vec<usize> = (0..n_features).collect();
        feature_indices.shuffle(rng);
        feature_indices.truncate(max_features);

        let labels: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let parent_impurity = self.impurity(&labels);

        let mut best_gain = 0.0;
        let mut best_split: Option<(usize, f64, Vec<usize>, Vec<usize>)> = None;

        for &feature_idx in &feature_indices {
            let mut values: Vec<f64> = indices.iter().map(|&i| x[i][feature_idx]).collect();
            values.sort_by(|a, b| a.total_cmp(b));
            values.dedup();

            for window in values.windows(2) {
                let threshold = (window[0] + window[1]) / 2.0;

                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| x[i][feature_idx] <= threshold);

                if left_idx.is_empty() || right_idx.is_empty() {
                    continue;
                }

                let left_labels: Vec<f64> = left_idx.iter().map(|&i| y[i]).collect();
                let right_labels: Vec<f64> = right_idx.iter().map(|&i| y[i]).collect();

                let n_left = left_idx.len() as f64;
                let n_right = right_idx.len() as f64;
                let weighted = (n_left * self.impurity(&left_labels)
                    + n_right * self.impurity(&right_labels))
                    / (n_left + n_right);
                let gain = parent_impurity - weighted;

                if gain > best_gain {
                    best_gain = gain;
                    best_split = Some((feature_idx, threshold, left_idx, right_idx));
                }
            }
        }

        best_split
    }

    /// Predict for a single sample
    pub fn predict_one(&self, features: &[f64]) -> f64 {
        match &self.root {
            Some(node) => traverse(node, features).value,
            None => 0.0,
        }
    }

    /// Positive-class share at the matched leaf (classification)
    pub fn positive_rate_one(&self, features: &[f64]) -> f64 {
        match &self.root {
            Some(node) => traverse(node, features).positive_rate.unwrap_or(0.5),
            None => 0.5,
        }
    }
}

fn traverse<'a>(node: &'a TreeNode, features: &[f64]) -> &'a TreeNode {
    if node.is_leaf() {
        return node;
    }
    let (Some(feature_idx), Some(threshold)) = (node.feature_idx, node.threshold) else {
        return node;
    };
    let child = if features.get(feature_idx).copied().unwrap_or(f64::NAN) <= threshold {
        node.left.as_deref()
    } else {
        node.right.as_deref()
    };
    match child {
        Some(child) => traverse(child, features),
        None => node,
    }
}

/// Random forest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Max features per split (None = sqrt for classification, n/3 for
    /// regression)
    pub max_features: Option<usize>,
    /// Bootstrap sampling per tree
    pub bootstrap: bool,
    pub seed: u64,
    pub task: TaskKind,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 10,
            min_samples_split: 50,
            min_samples_leaf: 2,
            max_features: None,
            bootstrap: true,
            seed: 1,
            task: TaskKind::Classification,
        }
    }
}

/// Random forest model; the artifact unit stored in the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
        }
    }

    pub fn task(&self) -> TaskKind {
        self.config.task
    }

    /// Fit the forest on a row-major feature matrix and labels
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        if x.len() != y.len() || x.is_empty() {
            return Err(PipelineError::ShapeMismatch {
                left: x.len(),
                right: y.len(),
            });
        }

        let n_features = x.first().map(Vec::len).unwrap_or(0);
        let max_features = self.config.max_features.unwrap_or(match self.config.task {
            TaskKind::Classification => (n_features as f64).sqrt().ceil() as usize,
            TaskKind::Regression => (n_features / 3).max(1),
        });

        self.trees = (0..self.config.n_trees)
            .into_par_iter()
            .map(|i| {
                let tree_seed = self.config.seed.wrapping_add(i as u64);
                let mut tree = DecisionTree::new(TreeConfig {
                    max_depth: self.config.max_depth,
                    min_samples_split: self.config.min_samples_split,
                    min_samples_leaf: self.config.min_samples_leaf,
                    max_features: Some(max_features),
                    seed: tree_seed,
                    task: self.config.task,
                });

                if self.config.bootstrap {
                    let (bx, by) = bootstrap_sample(x, y, tree_seed);
                    tree.fit(&bx, &by)?;
                } else {
                    tree.fit(x, y)?;
                }
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(())
    }

    /// Predict for a single sample
    pub fn predict_one(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        match self.config.task {
            TaskKind::Classification => {
                let rate = self
                    .trees
                    .iter()
                    .map(|t| t.positive_rate_one(features))
                    .sum::<f64>()
                    / self.trees.len() as f64;
                if rate > 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            TaskKind::Regression => {
                self.trees
                    .iter()
                    .map(|t| t.predict_one(features))
                    .sum::<f64>()
                    / self.trees.len() as f64
            }
        }
    }

    /// Predict for multiple samples
    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict_one(row)).collect()
    }

    /// Serialize the fitted forest as a portable JSON artifact
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Load a forest back from its JSON artifact
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| PipelineError::InferenceError(format!("bad model artifact: {e}")))
    }
}

fn bootstrap_sample(x: &[Vec<f64>], y: &[f64], seed: u64) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n = x.len();
    let mut bx = Vec::with_capacity(n);
    let mut by = Vec::with_capacity(n);
    for _ in 0..n {
        let i = rng.gen_range(0..n);
        bx.push(x[i].clone());
        by.push(y[i]);
    }
    (bx, by)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn mse_impurity(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn positive_rate(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.5;
    }
    values.iter().filter(|&&v| v > 0.0).count() as f64 / values.len() as f64
}

fn gini(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let p = positive_rate(values);
    2.0 * p * (1.0 - p)
}
