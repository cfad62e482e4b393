//! A small gradient-boosted regression-tree model (spec.md §4.5).
//!
//! No boosted-tree crate appears anywhere in the retrieved example pack —
//! the teacher's own numeric modules (decomposition, period detection,
//! changepoint search) are all hand-implemented rather than delegated to an
//! external stats-model crate, so the same register is used here: a plain
//! CART regression tree, boosted with a fixed learning rate, fit on the
//! fixed feature order spec.md names.

use crate::error::{ForecastError, Result};
use crate::types::FeatureRow;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Length of the fixed feature vector spec.md §4.5 requires to be
/// reproduced in the same order at training and inference time.
pub const FEATURE_COUNT: usize = 14;

/// Hyperparameters fixed by spec.md §4.5 — no per-run tuning.
#[derive(Debug, Clone, Copy)]
pub struct GbmParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
    pub subsample: f64,
    pub feature_subsample: f64,
    pub l1: f64,
    pub l2: f64,
    pub seed: u64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_trees: 300,
            max_depth: 6,
            learning_rate: 0.05,
            min_samples_leaf: 10,
            subsample: 0.8,
            feature_subsample: 0.8,
            l1: 0.1,
            l2: 0.1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
struct DecisionTree {
    root: Node,
}

impl DecisionTree {
    fn predict(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        Self::eval(&self.root, x)
    }

    fn eval(node: &Node, x: &[f64; FEATURE_COUNT]) -> f64 {
        match node {
            Node::Leaf(v) => *v,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if x[*feature] <= *threshold {
                    Self::eval(left, x)
                } else {
                    Self::eval(right, x)
                }
            }
        }
    }

    fn fit(
        x: &[[f64; FEATURE_COUNT]],
        residuals: &[f64],
        rows: Vec<usize>,
        features: &[usize],
        depth: usize,
        params: &GbmParams,
    ) -> Self {
        Self {
            root: Self::build(x, residuals, rows, features, depth, params),
        }
    }

    fn leaf_value(residuals: &[f64], rows: &[usize], params: &GbmParams) -> f64 {
        let sum: f64 = rows.iter().map(|&i| residuals[i]).sum();
        let n = rows.len() as f64;
        let shrunk = if sum > params.l1 {
            sum - params.l1
        } else if sum < -params.l1 {
            sum + params.l1
        } else {
            0.0
        };
        shrunk / (n + params.l2)
    }

    fn build(
        x: &[[f64; FEATURE_COUNT]],
        residuals: &[f64],
        rows: Vec<usize>,
        features: &[usize],
        depth: usize,
        params: &GbmParams,
    ) -> Node {
        if depth == 0 || rows.len() < 2 * params.min_samples_leaf {
            return Node::Leaf(Self::leaf_value(residuals, &rows, params));
        }

        match Self::best_split(x, residuals, &rows, features, params.min_samples_leaf) {
            Some((feature, threshold, left_rows, right_rows)) => Node::Split {
                feature,
                threshold,
                left: Box::new(Self::build(
                    x,
                    residuals,
                    left_rows,
                    features,
                    depth - 1,
                    params,
                )),
                right: Box::new(Self::build(
                    x,
                    residuals,
                    right_rows,
                    features,
                    depth - 1,
                    params,
                )),
            },
            None => Node::Leaf(Self::leaf_value(residuals, &rows, params)),
        }
    }

    /// Exhaustive best split search minimizing the sum of squared residuals
    /// of the two children, subject to the minimum leaf size.
    fn best_split(
        x: &[[f64; FEATURE_COUNT]],
        residuals: &[f64],
        rows: &[usize],
        features: &[usize],
        min_leaf: usize,
    ) -> Option<(usize, f64, Vec<usize>, Vec<usize>)> {
        let total_sum: f64 = rows.iter().map(|&i| residuals[i]).sum();
        let total_sq: f64 = rows.iter().map(|&i| residuals[i].powi(2)).sum();
        let n_total = rows.len() as f64;
        let base_sse = total_sq - total_sum * total_sum / n_total;

        let mut best: Option<(usize, f64, Vec<usize>, Vec<usize>, f64)> = None;

        for &feature in features {
            let mut sorted = rows.to_vec();
            sorted.sort_by(|&a, &b| {
                x[a][feature]
                    .partial_cmp(&x[b][feature])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for (pos, &i) in sorted.iter().enumerate() {
                left_sum += residuals[i];
                left_sq += residuals[i].powi(2);
                let n_left = (pos + 1) as f64;
                let n_right = n_total - n_left;
                if n_left < min_leaf as f64 || n_right < min_leaf as f64 {
                    continue;
                }
                // Skip thresholds that don't separate distinct values.
                if pos + 1 < sorted.len() && x[i][feature] == x[sorted[pos + 1]][feature] {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let left_sse = left_sq - left_sum * left_sum / n_left;
                let right_sse = right_sq - right_sum * right_sum / n_right;
                let gain = base_sse - (left_sse + right_sse);

                let better = match &best {
                    Some((.., best_gain)) => gain > *best_gain,
                    None => true,
                };
                if better && gain > 1e-9 {
                    let threshold = x[i][feature];
                    let left_rows: Vec<usize> = sorted[..=pos].to_vec();
                    let right_rows: Vec<usize> = sorted[pos + 1..].to_vec();
                    best = Some((feature, threshold, left_rows, right_rows, gain));
                }
            }
        }

        best.map(|(f, t, l, r, _)| (f, t, l, r))
    }
}

/// A fitted global gradient-boosted regression model for one location.
#[derive(Debug, Clone)]
pub struct GbmModel {
    trees: Vec<DecisionTree>,
    base_score: f64,
    learning_rate: f64,
}

impl GbmModel {
    /// Fit on all [`FeatureRow`]s with complete `lag_1`/`lag_24` (spec.md
    /// §4.5). Fails if there isn't enough trainable data to form even one
    /// leaf under `min_samples_leaf` — the caller treats that as
    /// `MLTrainingFailure` and falls back to baseline-only.
    pub fn fit(rows: &[FeatureRow], params: &GbmParams) -> Result<Self> {
        let trainable: Vec<&FeatureRow> = rows.iter().filter(|r| r.is_trainable()).collect();
        if trainable.len() < params.min_samples_leaf * 2 {
            return Err(ForecastError::ComputationError(format!(
                "not enough trainable rows for GBM: {} < {}",
                trainable.len(),
                params.min_samples_leaf * 2
            )));
        }

        let x: Vec<[f64; FEATURE_COUNT]> = trainable.iter().map(|r| r.to_vector()).collect();
        let y: Vec<f64> = trainable.iter().map(|r| r.cell.net_sales).collect();
        let n = x.len();

        let base_score = y.iter().sum::<f64>() / n as f64;
        let mut predictions = vec![base_score; n];
        let mut trees = Vec::with_capacity(params.n_trees);

        let sample_rows = ((n as f64) * params.subsample).round().max(1.0) as usize;
        let sample_features =
            ((FEATURE_COUNT as f64) * params.feature_subsample).round().max(1.0) as usize;

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        for _ in 0..params.n_trees {
            let residuals: Vec<f64> = y
                .iter()
                .zip(predictions.iter())
                .map(|(actual, pred)| actual - pred)
                .collect();

            let mut row_pool: Vec<usize> = (0..n).collect();
            let sampled_rows: Vec<usize> = row_pool
                .partial_shuffle(&mut rng, sample_rows)
                .0
                .to_vec();
            row_pool.clear();

            let mut feature_pool: Vec<usize> = (0..FEATURE_COUNT).collect();
            let sampled_features: Vec<usize> = feature_pool
                .partial_shuffle(&mut rng, sample_features)
                .0
                .to_vec();
            feature_pool.clear();

            let tree = DecisionTree::fit(
                &x,
                &residuals,
                sampled_rows,
                &sampled_features,
                params.max_depth,
                params,
            );

            for (i, xi) in x.iter().enumerate() {
                predictions[i] += params.learning_rate * tree.predict(xi);
            }
            trees.push(tree);
        }

        Ok(Self {
            trees,
            base_score,
            learning_rate: params.learning_rate,
        })
    }

    /// Predict a single feature vector, clipped at zero (spec.md §4.5).
    pub fn predict(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let raw = self.base_score
            + self.learning_rate * self.trees.iter().map(|t| t.predict(x)).sum::<f64>();
        raw.max(0.0)
    }
}
