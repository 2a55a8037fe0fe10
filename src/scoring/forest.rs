// Random forest regression
// Bagged multi-output CART trees; each split minimizes the squared error summed over all targets

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::model::{Regressor, ScoringError};
use crate::config::EvaluationConfig;
use crate::swing::types::FEATURE_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,

    /// Nodes with fewer rows become leaves
    pub min_samples_split: usize,

    /// Tree `t` bootstraps with `seed + t`
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParams {
            n_trees: 200,
            max_depth: 8,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

impl From<&EvaluationConfig> for ForestParams {
    fn from(config: &EvaluationConfig) -> Self {
        ForestParams {
            n_trees: config.n_trees,
            max_depth: config.max_depth,
            seed: config.seed,
            ..ForestParams::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

struct TrainingSet<'a> {
    rows: &'a [[f64; FEATURE_COUNT]],
    targets: &'a [Vec<f64>],
    width: usize,
}

impl TrainingSet<'_> {
    fn mean(&self, indices: &[usize]) -> Vec<f64> {
        let mut sums = vec![0.0; self.width];
        for &i in indices {
            for (sum, y) in sums.iter_mut().zip(&self.targets[i]) {
                *sum += y;
            }
        }
        let n = indices.len() as f64;
        sums.into_iter().map(|s| s / n).collect()
    }

    /// Squared error of a node given per-target sums and sums of squares
    fn sse(sum: &[f64], sq: &[f64], n: usize) -> f64 {
        let n = n as f64;
        sum.iter().zip(sq).map(|(s, q)| q - s * s / n).sum()
    }

    /// Feature and threshold of the split with the lowest child error, if it beats the parent
    fn best_split(&self, indices: &[usize]) -> Option<(usize, f64)> {
        let n = indices.len();
        let mut total_sum = vec![0.0; self.width];
        let mut total_sq = vec![0.0; self.width];
        for &i in indices {
            for (t, y) in self.targets[i].iter().enumerate() {
                total_sum[t] += y;
                total_sq[t] += y * y;
            }
        }
        let parent_sse = Self::sse(&total_sum, &total_sq, n);
        if parent_sse <= f64::EPSILON {
            return None;
        }

        let mut best: Option<(usize, f64, f64)> = None;
        let mut order = indices.to_vec();
        let mut left_sum = vec![0.0; self.width];
        let mut left_sq = vec![0.0; self.width];
        let mut right_sum = vec![0.0; self.width];
        let mut right_sq = vec![0.0; self.width];

        for feature in 0..FEATURE_COUNT {
            order.sort_by(|&a, &b| self.rows[a][feature].total_cmp(&self.rows[b][feature]));
            left_sum.iter_mut().for_each(|v| *v = 0.0);
            left_sq.iter_mut().for_each(|v| *v = 0.0);

            for k in 0..n - 1 {
                let i = order[k];
                for (t, y) in self.targets[i].iter().enumerate() {
                    left_sum[t] += y;
                    left_sq[t] += y * y;
                }

                let here = self.rows[i][feature];
                let next = self.rows[order[k + 1]][feature];
                if next <= here {
                    continue;
                }

                for t in 0..self.width {
                    right_sum[t] = total_sum[t] - left_sum[t];
                    right_sq[t] = total_sq[t] - left_sq[t];
                }
                let sse = Self::sse(&left_sum, &left_sq, k + 1)
                    + Self::sse(&right_sum, &right_sq, n - k - 1);

                if best.map_or(true, |(_, _, b)| sse < b) {
                    let mut threshold = (here + next) / 2.0;
                    if threshold >= next {
                        threshold = here;
                    }
                    best = Some((feature, threshold, sse));
                }
            }
        }

        best.filter(|(_, _, sse)| *sse < parent_sse)
            .map(|(feature, threshold, _)| (feature, threshold))
    }

    fn build(&self, indices: Vec<usize>, depth: usize, params: &ForestParams) -> Node {
        if depth >= params.max_depth || indices.len() < params.min_samples_split.max(2) {
            return Node::Leaf {
                value: self.mean(&indices),
            };
        }

        let Some((feature, threshold)) = self.best_split(&indices) else {
            return Node::Leaf {
                value: self.mean(&indices),
            };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| self.rows[i][feature] <= threshold);
        if left.is_empty() || right.is_empty() {
            return Node::Leaf {
                value: self.mean(&indices),
            };
        }

        Node::Split {
            feature,
            threshold,
            left: Box::new(self.build(left, depth + 1, params)),
            right: Box::new(self.build(right, depth + 1, params)),
        }
    }
}

/// One regression tree over standardized feature rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    fn fit(set: &TrainingSet<'_>, indices: Vec<usize>, params: &ForestParams) -> Self {
        RegressionTree {
            root: set.build(indices, 0, params),
        }
    }

    pub fn predict(&self, features: &[f64; FEATURE_COUNT]) -> &[f64] {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn depth_of(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        depth_of(&self.root)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<RegressionTree>,
    targets: usize,
}

impl RandomForestRegressor {
    /// Fit `params.n_trees` trees, each on a bootstrap sample of the rows
    ///
    /// Trees are grown on the rayon pool; the result depends only on the
    /// data and the seed.
    pub fn fit(
        rows: &[[f64; FEATURE_COUNT]],
        targets: &[Vec<f64>],
        params: &ForestParams,
    ) -> Result<Self, ScoringError> {
        let width = targets.first().ok_or(ScoringError::EmptyTrainingSet)?.len();
        if rows.len() != targets.len() {
            return Err(ScoringError::DimensionMismatch {
                expected: rows.len(),
                found: targets.len(),
            });
        }
        if let Some(bad) = targets.iter().find(|t| t.len() != width) {
            return Err(ScoringError::DimensionMismatch {
                expected: width,
                found: bad.len(),
            });
        }
        if params.n_trees == 0 {
            return Err(ScoringError::InvalidParameter(
                "forest needs at least one tree".to_string(),
            ));
        }
        if rows.iter().flatten().chain(targets.iter().flatten()).any(|v| !v.is_finite()) {
            return Err(ScoringError::NonFinite("forest training data"));
        }

        let set = TrainingSet {
            rows,
            targets,
            width,
        };
        let n = rows.len();

        let trees = (0..params.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(&set, sample, params)
            })
            .collect();

        Ok(RandomForestRegressor {
            trees,
            targets: width,
        })
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

impl Regressor for RandomForestRegressor {
    fn targets(&self) -> usize {
        self.targets
    }

    /// Average of the per-tree leaf values
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Vec<f64> {
        let mut sums = vec![0.0; self.targets];
        for tree in &self.trees {
            for (sum, v) in sums.iter_mut().zip(tree.predict(features)) {
                *sum += v;
            }
        }
        let n = self.trees.len() as f64;
        sums.into_iter().map(|s| s / n).collect()
    }
}
