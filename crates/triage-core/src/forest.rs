//! Random forests of CART classification trees over sparse features, and the
//! multi-output estimator that trains one forest per label.
//!
//! Trees split on Gini impurity, draw `max_features` candidate features per
//! node and grow until pure unless limited by depth or split size. Each tree
//! owns an RNG seeded from the forest seed and its index, so a fit is
//! reproducible whatever the rayon thread count.

use crate::error::{Result, TriageError};
use crate::matrix::{LabelMatrix, SparseMatrix, SparseRow};
use crate::pipeline::{Estimator, Stage};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Number of candidate features drawn at each split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    #[default]
    Sqrt,
    Log2,
    All,
}

impl MaxFeatures {
    /// Concrete count for `n_features`, at least one.
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            MaxFeatures::Sqrt => n.sqrt() as usize,
            MaxFeatures::Log2 => n.log2().max(0.0) as usize,
            MaxFeatures::All => n_features,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Hyperparameters of one random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees.
    pub n_estimators: usize,
    /// Maximum tree depth; `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    /// Minimum distinct samples a node needs to be split.
    pub min_samples_split: usize,
    pub max_features: MaxFeatures,
    /// Train each tree on a bootstrap resample.
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(TriageError::Fit("forest needs at least one tree".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(TriageError::Fit(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        if self.max_depth == Some(0) {
            return Err(TriageError::Fit("max_depth must be positive".to_string()));
        }
        Ok(())
    }
}

/// Derive an independent seed for sub-stream `stream` of `seed` (splitmix64).
pub(crate) fn derive_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed ^ stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        proba: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted classification tree. Samples with `x[feature] <= threshold` go left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Node::Split { left, right, .. } = &self.nodes[id] {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        max_depth
    }

    /// Class distribution of the leaf `row` falls into.
    pub fn predict_proba(&self, row: &SparseRow) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { proba } => return proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row.get(*feature) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

/// Scratch state for growing one tree.
struct TreeGrower<'a> {
    x: &'a SparseMatrix,
    targets: &'a [usize],
    weights: &'a [f64],
    n_classes: usize,
    max_features: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    present_stamp: Vec<u32>,
    slot: Vec<usize>,
    stamp: u32,
}

impl<'a> TreeGrower<'a> {
    fn grow(mut self, rng: &mut ChaCha8Rng) -> DecisionTree {
        let root: Vec<usize> = (0..self.x.n_rows())
            .filter(|&i| self.weights[i] > 0.0)
            .collect();

        let mut nodes = vec![Node::Leaf { proba: Vec::new() }];
        let mut stack = vec![(0usize, root, 0usize)];

        while let Some((id, samples, depth)) = stack.pop() {
            let counts = self.class_counts(&samples);
            let split = if self.is_leaf(&samples, &counts, depth) {
                None
            } else {
                self.find_split(&samples, &counts, rng)
            };

            match split {
                None => {
                    let total: f64 = counts.iter().sum();
                    let proba = counts
                        .iter()
                        .map(|c| if total > 0.0 { c / total } else { 0.0 })
                        .collect();
                    nodes[id] = Node::Leaf { proba };
                }
                Some(split) => {
                    let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
                        .iter()
                        .copied()
                        .partition(|&s| self.x.row(s).get(split.feature) <= split.threshold);
                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(Node::Leaf { proba: Vec::new() });
                    nodes.push(Node::Leaf { proba: Vec::new() });
                    nodes[id] = Node::Split {
                        feature: split.feature,
                        threshold: split.threshold,
                        left,
                        right,
                    };
                    stack.push((right, right_samples, depth + 1));
                    stack.push((left, left_samples, depth + 1));
                }
            }
        }

        DecisionTree { nodes }
    }

    fn class_counts(&self, samples: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &s in samples {
            counts[self.targets[s]] += self.weights[s];
        }
        counts
    }

    fn is_leaf(&self, samples: &[usize], counts: &[f64], depth: usize) -> bool {
        self.max_depth.map_or(false, |max| depth >= max)
            || samples.len() < self.min_samples_split
            || counts.iter().filter(|&&c| c > 0.0).count() <= 1
    }

    fn find_split(
        &mut self,
        samples: &[usize],
        counts: &[f64],
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        self.stamp += 1;
        let stamp = self.stamp;

        // Features with at least one non-zero value in this node; all others
        // are constant here and cannot split it.
        let mut present = Vec::new();
        for &s in samples {
            for &f in self.x.row(s).indices() {
                if self.present_stamp[f] != stamp {
                    self.present_stamp[f] = stamp;
                    present.push(f);
                }
            }
        }
        if present.is_empty() {
            return None;
        }

        let n_features = self.x.n_cols();
        let drawn = index::sample(rng, n_features, self.max_features.min(n_features));
        let mut candidates: Vec<usize> = drawn
            .iter()
            .filter(|&f| self.present_stamp[f] == stamp)
            .collect();
        if candidates.is_empty() {
            candidates.push(present[rng.gen_range(0..present.len())]);
        }

        if let Some(best) = self.best_split(samples, counts, &candidates) {
            return Some(best);
        }

        // Keep drawing until some feature separates the node.
        let tried: BTreeSet<usize> = candidates.into_iter().collect();
        let mut rest: Vec<usize> = present.into_iter().filter(|f| !tried.contains(f)).collect();
        while !rest.is_empty() {
            let f = rest.swap_remove(rng.gen_range(0..rest.len()));
            if let Some(best) = self.best_split(samples, counts, &[f]) {
                return Some(best);
            }
        }
        None
    }

    fn best_split(
        &mut self,
        samples: &[usize],
        counts: &[f64],
        candidates: &[usize],
    ) -> Option<SplitCandidate> {
        for (pos, &f) in candidates.iter().enumerate() {
            self.slot[f] = pos;
        }
        let mut entries: Vec<Vec<(f64, usize, f64)>> = vec![Vec::new(); candidates.len()];
        for &s in samples {
            for (f, v) in self.x.row(s).iter() {
                let pos = self.slot[f];
                if pos != usize::MAX {
                    entries[pos].push((v, self.targets[s], self.weights[s]));
                }
            }
        }
        for &f in candidates {
            self.slot[f] = usize::MAX;
        }

        let mut best: Option<SplitCandidate> = None;
        for (&feature, mut points) in candidates.iter().zip(entries) {
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            if let Some((threshold, impurity)) = scan_thresholds(&points, counts, self.n_classes) {
                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }
        best
    }
}

fn gini(counts: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total) * (c / total)).sum::<f64>()
}

/// Best threshold over sorted non-zero `points` plus the implicit zero group.
/// Returns `(threshold, weighted child impurity)`.
fn scan_thresholds(
    points: &[(f64, usize, f64)],
    node_counts: &[f64],
    n_classes: usize,
) -> Option<(f64, f64)> {
    let mut zero_counts = node_counts.to_vec();
    for &(_, class, weight) in points {
        zero_counts[class] -= weight;
    }
    let zero_weight: f64 = zero_counts.iter().sum();
    let total: f64 = node_counts.iter().sum();

    let mut left = vec![0.0; n_classes];
    let mut left_weight = 0.0;
    let mut prev: Option<f64> = None;
    let mut best: Option<(f64, f64)> = None;
    let mut zero_pending = zero_weight > 1e-9;

    let mut consider = |value: f64, left: &[f64], left_weight: f64, prev: Option<f64>| {
        let Some(p) = prev else { return };
        let right_weight = total - left_weight;
        if value <= p || left_weight <= 1e-9 || right_weight <= 1e-9 {
            return;
        }
        let right: Vec<f64> = node_counts.iter().zip(left).map(|(n, l)| n - l).collect();
        let impurity = (left_weight * gini(left, left_weight)
            + right_weight * gini(&right, right_weight))
            / total;
        if best.map_or(true, |(_, b)| impurity < b) {
            let mut threshold = p / 2.0 + value / 2.0;
            if threshold >= value || !threshold.is_finite() {
                threshold = p;
            }
            best = Some((threshold, impurity));
        }
    };

    for &(value, class, weight) in points {
        if zero_pending && value > 0.0 {
            consider(0.0, &left, left_weight, prev);
            for (l, z) in left.iter_mut().zip(&zero_counts) {
                *l += z;
            }
            left_weight += zero_weight;
            prev = Some(0.0);
            zero_pending = false;
        }
        consider(value, &left, left_weight, prev);
        left[class] += weight;
        left_weight += weight;
        prev = Some(value);
    }
    if zero_pending {
        consider(0.0, &left, left_weight, prev);
    }

    best
}

/// An ensemble of bootstrap-trained trees for one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    classes: Vec<u8>,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit a forest on `x` with one target value per row.
    pub fn fit(x: &SparseMatrix, y: &[u8], params: &ForestParams) -> Result<Self> {
        params.validate()?;
        let n = x.n_rows();
        if n == 0 {
            return Err(TriageError::Data("cannot fit a forest on zero rows".to_string()));
        }
        if y.len() != n {
            return Err(TriageError::Data(format!(
                "{} feature rows but {} targets",
                n,
                y.len()
            )));
        }

        let classes: Vec<u8> = y.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let mut lookup = [0usize; 256];
        for (idx, class) in classes.iter().enumerate() {
            lookup[*class as usize] = idx;
        }
        let targets: Vec<usize> = y.iter().map(|v| lookup[*v as usize]).collect();
        let max_features = params.max_features.resolve(x.n_cols());

        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(derive_seed(params.seed, i as u64));
                let weights = if params.bootstrap {
                    let mut w = vec![0.0; n];
                    for _ in 0..n {
                        w[rng.gen_range(0..n)] += 1.0;
                    }
                    w
                } else {
                    vec![1.0; n]
                };
                let grower = TreeGrower {
                    x,
                    targets: &targets,
                    weights: &weights,
                    n_classes: classes.len(),
                    max_features,
                    max_depth: params.max_depth,
                    min_samples_split: params.min_samples_split,
                    present_stamp: vec![0; x.n_cols()],
                    slot: vec![usize::MAX; x.n_cols()],
                    stamp: 0,
                };
                grower.grow(&mut rng)
            })
            .collect();

        Ok(Self {
            classes,
            n_features: x.n_cols(),
            trees,
        })
    }

    pub fn classes(&self) -> &[u8] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Mean class distribution over all trees, ordered like [`Self::classes`].
    pub fn predict_proba(&self, row: &SparseRow) -> Vec<f64> {
        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.predict_proba(row)) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    /// Most probable class; ties go to the smaller class value.
    pub fn predict_row(&self, row: &SparseRow) -> u8 {
        let proba = self.predict_proba(row);
        let mut best = 0;
        for (idx, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = idx;
            }
        }
        self.classes[best]
    }

    pub fn predict(&self, x: &SparseMatrix) -> Vec<u8> {
        x.rows().iter().map(|row| self.predict_row(row)).collect()
    }
}

/// One independent forest per label column over a shared feature matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiOutputForest {
    params: ForestParams,
    forests: Vec<RandomForest>,
}

impl MultiOutputForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            forests: Vec::new(),
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn forests(&self) -> &[RandomForest] {
        &self.forests
    }
}

impl Stage for MultiOutputForest {
    fn name(&self) -> &'static str {
        "clf"
    }
}

impl Estimator<SparseMatrix> for MultiOutputForest {
    fn fit(&mut self, features: &SparseMatrix, targets: &LabelMatrix) -> Result<()> {
        if targets.n_cols() == 0 {
            return Err(TriageError::Data("label matrix has zero columns".to_string()));
        }
        if features.n_rows() != targets.n_rows() {
            return Err(TriageError::Data(format!(
                "{} feature rows but {} label rows",
                features.n_rows(),
                targets.n_rows()
            )));
        }
        self.params.validate()?;

        let base = &self.params;
        self.forests = (0..targets.n_cols())
            .into_par_iter()
            .map(|label| -> Result<RandomForest> {
                let params = ForestParams {
                    seed: derive_seed(base.seed, label as u64),
                    ..base.clone()
                };
                let forest = RandomForest::fit(features, &targets.column(label), &params)?;
                debug!(
                    label,
                    trees = forest.trees().len(),
                    classes = forest.classes().len(),
                    "Fitted label forest"
                );
                Ok(forest)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    fn predict(&self, features: &SparseMatrix) -> Result<LabelMatrix> {
        let first = self
            .forests
            .first()
            .ok_or_else(|| TriageError::Fit("classifier is not fitted".to_string()))?;
        if features.n_cols() != first.n_features() {
            return Err(TriageError::Data(format!(
                "classifier fitted on {} features, got {}",
                first.n_features(),
                features.n_cols()
            )));
        }
        let rows: Vec<Vec<u8>> = features
            .rows()
            .par_iter()
            .map(|row| self.forests.iter().map(|f| f.predict_row(row)).collect())
            .collect();
        LabelMatrix::from_rows(self.forests.len(), &rows)
    }
}
