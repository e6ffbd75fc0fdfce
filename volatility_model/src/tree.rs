//! Regression tree grown on a (possibly repeated) subset of sample rows.

use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct TreeSettings {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split, at most the number of columns.
    pub max_features: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: TreeNode,
}

struct Split {
    feature_idx: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    /// Grows a tree minimising squared error on `x[rows]`, `y[rows]`.
    pub fn grow(
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        settings: &TreeSettings,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let mut features: Vec<usize> = (0..x.ncols()).collect();
        let root = build_node(x, y, rows.to_vec(), 0, settings, &mut features, rng);
        Self { root }
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn depth_of(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        depth_of(&self.root)
    }
}

fn build_node(
    x: &Array2<f64>,
    y: &Array1<f64>,
    rows: Vec<usize>,
    depth: usize,
    settings: &TreeSettings,
    features: &mut [usize],
    rng: &mut ChaCha8Rng,
) -> TreeNode {
    let n_samples = rows.len();
    let (sum, sum_sq) = rows
        .iter()
        .fold((0.0, 0.0), |(s, sq), &i| (s + y[i], sq + y[i] * y[i]));
    let leaf = TreeNode::Leaf {
        value: if n_samples == 0 { 0.0 } else { sum / n_samples as f64 },
    };
    let parent_sse = sse(sum, sum_sq, n_samples);

    let stop = n_samples < settings.min_samples_split
        || n_samples < 2 * settings.min_samples_leaf
        || settings.max_depth.is_some_and(|d| depth >= d)
        || parent_sse <= f64::EPSILON * sum_sq.max(1.0);
    if stop {
        return leaf;
    }

    let candidates = if settings.max_features < features.len() {
        features.partial_shuffle(rng, settings.max_features).0
    } else {
        &mut features[..]
    };
    let candidates = candidates.to_vec();

    let best = candidates
        .iter()
        .filter_map(|&feature_idx| best_split_on(x, y, &rows, feature_idx, settings.min_samples_leaf))
        .min_by(|a, b| a.sse.total_cmp(&b.sse));

    match best {
        Some(split) if split.sse < parent_sse => {
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .partition(|&&i| x[[i, split.feature_idx]] <= split.threshold);
            let left = build_node(x, y, left_rows, depth + 1, settings, features, rng);
            let right = build_node(x, y, right_rows, depth + 1, settings, features, rng);
            TreeNode::Split {
                feature_idx: split.feature_idx,
                threshold: split.threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => leaf,
    }
}

/// Scans the sorted values of one feature with running sums; O(n log n).
fn best_split_on(
    x: &Array2<f64>,
    y: &Array1<f64>,
    rows: &[usize],
    feature_idx: usize,
    min_samples_leaf: usize,
) -> Option<Split> {
    let mut sorted: Vec<(f64, f64)> = rows.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n = sorted.len();
    let total_sum: f64 = sorted.iter().map(|(_, v)| v).sum();
    let total_sq: f64 = sorted.iter().map(|(_, v)| v * v).sum();
    let min_leaf = min_samples_leaf.max(1);

    let mut left_sum = 0.0;
    let mut left_sq = 0.0;
    let mut best: Option<Split> = None;
    for k in 1..n {
        let (value, target) = sorted[k - 1];
        left_sum += target;
        left_sq += target * target;

        if k < min_leaf || n - k < min_leaf || value == sorted[k].0 {
            continue;
        }
        let split_sse = sse(left_sum, left_sq, k) + sse(total_sum - left_sum, total_sq - left_sq, n - k);
        if best.as_ref().is_none_or(|b| split_sse < b.sse) {
            best = Some(Split {
                feature_idx,
                threshold: (value + sorted[k].0) / 2.0,
                sse: split_sse,
            });
        }
    }
    best
}

fn sse(sum: f64, sum_sq: f64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    (sum_sq - sum * sum / count as f64).max(0.0)
}
