//! CART decision tree with Gini impurity.

use ndarray::{ArrayView1, ArrayView2};

use super::{check_query_width, check_training_input, Classifier, ModelError};

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        /// Samples per class reaching this leaf.
        counts: [usize; 2],
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct DecisionTreeClassifier {
    max_depth: Option<usize>,
    n_features: usize,
    root: Option<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn gini(counts: [usize; 2]) -> f64 {
    let total = (counts[0] + counts[1]) as f64;
    if total == 0.0 {
        return 0.0;
    }
    let p0 = counts[0] as f64 / total;
    let p1 = counts[1] as f64 / total;
    1.0 - p0 * p0 - p1 * p1
}

fn class_counts(y: &[u8], indices: &[usize]) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for &i in indices {
        counts[usize::from(y[i])] += 1;
    }
    counts
}

impl DecisionTreeClassifier {
    pub fn new(max_depth: Option<usize>) -> Self {
        Self { max_depth, n_features: 0, root: None }
    }

    /// Depth of the fitted tree (a single leaf has depth 0).
    pub fn depth(&self) -> Option<usize> {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map(walk)
    }

    fn best_split(x: &ArrayView2<f64>, y: &[u8], indices: &[usize]) -> Option<BestSplit> {
        let n = indices.len();
        let total = class_counts(y, indices);
        let mut best: Option<BestSplit> = None;

        for feature in 0..x.ncols() {
            let mut order = indices.to_vec();
            order.sort_by(|&a, &b| {
                x[[a, feature]]
                    .partial_cmp(&x[[b, feature]])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left = [0usize; 2];
            for pos in 1..n {
                left[usize::from(y[order[pos - 1]])] += 1;
                let lo = x[[order[pos - 1], feature]];
                let hi = x[[order[pos], feature]];
                if !(lo < hi) {
                    continue;
                }

                let right = [total[0] - left[0], total[1] - left[1]];
                let impurity = (pos as f64 * gini(left) + (n - pos) as f64 * gini(right)) / n as f64;
                if best.as_ref().map_or(true, |b| impurity < b.impurity - 1e-12) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    // Adjacent floats can round the midpoint up to `hi`.
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(BestSplit { feature, threshold, impurity });
                }
            }
        }

        best
    }

    fn grow(&self, x: &ArrayView2<f64>, y: &[u8], indices: &[usize], depth: usize) -> Node {
        let counts = class_counts(y, indices);
        let pure = counts[0] == 0 || counts[1] == 0;
        let depth_reached = self.max_depth.is_some_and(|max| depth >= max);
        if pure || depth_reached || indices.len() < 2 {
            return Node::Leaf { counts };
        }

        let Some(split) = Self::best_split(x, y, indices) else {
            return Node::Leaf { counts };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, split.feature]] <= split.threshold);

        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.grow(x, y, &left, depth + 1)),
            right: Box::new(self.grow(x, y, &right, depth + 1)),
        }
    }

    fn leaf_counts(&self, x: &ArrayView1<f64>) -> Result<[usize; 2], ModelError> {
        let mut node = self.root.as_ref().ok_or(ModelError::NotFitted)?;
        check_query_width(self.n_features, x)?;
        loop {
            match node {
                Node::Leaf { counts } => return Ok(*counts),
                Node::Split { feature, threshold, left, right } => {
                    node = if x[*feature] <= *threshold { left.as_ref() } else { right.as_ref() };
                }
            }
        }
    }
}

impl Classifier for DecisionTreeClassifier {
    fn fit(&mut self, x: &ArrayView2<f64>, y: &[u8]) -> Result<(), ModelError> {
        check_training_input(x, y)?;
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.n_features = x.ncols();
        self.root = Some(self.grow(x, y, &indices, 0));
        Ok(())
    }

    fn predict(&self, x: &ArrayView1<f64>) -> Result<u8, ModelError> {
        let counts = self.leaf_counts(x)?;
        Ok(u8::from(counts[1] > counts[0]))
    }

    fn predict_proba(&self, x: &ArrayView1<f64>) -> Option<Result<[f64; 2], ModelError>> {
        Some(self.leaf_counts(x).map(|counts| {
            let total = (counts[0] + counts[1]) as f64;
            [counts[0] as f64 / total, counts[1] as f64 / total]
        }))
    }
}
