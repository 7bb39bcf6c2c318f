//! Soft-margin support vector classifier with an RBF kernel, trained by SMO.

use std::collections::HashMap;
use std::rc::Rc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use super::{check_query_width, check_training_input, Classifier, ModelError};

/// Hard cap on SMO sweeps so a non-converging problem still terminates.
const MAX_SWEEPS: usize = 10_000;
/// Smallest alpha movement accepted as progress.
const MIN_ALPHA_STEP: f64 = 1e-5;
/// Alphas below this are not kept as support vectors.
const SUPPORT_THRESHOLD: f64 = 1e-8;
/// Memory budget for cached kernel rows.
const KERNEL_CACHE_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone)]
struct Fitted {
    support_vectors: Array2<f64>,
    /// `alpha_i * y_i` for every support vector.
    dual_coef: Array1<f64>,
    intercept: f64,
    gamma: f64,
}

#[derive(Debug, Clone)]
pub struct SvmClassifier {
    c: f64,
    tol: f64,
    max_passes: usize,
    /// `None` sizes the kernel cache from its memory budget.
    cache_rows: Option<usize>,
    fitted: Option<Fitted>,
}

fn rbf(a: &ArrayView1<f64>, b: &ArrayView1<f64>, gamma: f64) -> f64 {
    let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    (-gamma * sq).exp()
}

/// `1 / (n_features * Var(X))`, falling back to 1 for a constant matrix.
fn scale_gamma(x: &ArrayView2<f64>) -> f64 {
    let n = x.len() as f64;
    let mean = x.sum() / n;
    let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    if var > 0.0 && var.is_finite() {
        1.0 / (x.ncols() as f64 * var)
    } else {
        1.0
    }
}

/// Kernel rows computed on demand, at most `capacity` held at once.
/// The least recently used row is evicted first.
struct KernelCache<'a> {
    x: ArrayView2<'a, f64>,
    gamma: f64,
    capacity: usize,
    rows: HashMap<usize, (Rc<[f64]>, u64)>,
    clock: u64,
}

impl<'a> KernelCache<'a> {
    fn new(x: ArrayView2<'a, f64>, gamma: f64, capacity: usize) -> Self {
        Self {
            x,
            gamma,
            capacity: capacity.max(2),
            rows: HashMap::new(),
            clock: 0,
        }
    }

    /// Rows that fit in `KERNEL_CACHE_BYTES`, never fewer than the two a step needs.
    fn capacity_for(n: usize) -> usize {
        (KERNEL_CACHE_BYTES / (n.max(1) * std::mem::size_of::<f64>())).clamp(2, n.max(2))
    }

    fn row(&mut self, i: usize) -> Rc<[f64]> {
        self.clock += 1;
        if let Some((row, used)) = self.rows.get_mut(&i) {
            *used = self.clock;
            return Rc::clone(row);
        }

        if self.rows.len() >= self.capacity {
            let oldest = self
                .rows
                .iter()
                .min_by_key(|(_, (_, used))| *used)
                .map(|(&key, _)| key);
            if let Some(key) = oldest {
                self.rows.remove(&key);
            }
        }

        let xi = self.x.row(i);
        let row: Rc<[f64]> = self
            .x
            .rows()
            .into_iter()
            .map(|xj| rbf(&xi, &xj, self.gamma))
            .collect();
        self.rows.insert(i, (Rc::clone(&row), self.clock));
        row
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Working state of one SMO run.
struct Smo<'a> {
    kernel: KernelCache<'a>,
    y: Vec<f64>,
    alpha: Vec<f64>,
    /// Cached `f(x_k) - y_k`.
    errors: Vec<f64>,
    b: f64,
    c: f64,
}

impl Smo<'_> {
    fn violates_kkt(&self, i: usize, tol: f64) -> bool {
        let r = self.y[i] * self.errors[i];
        (r < -tol && self.alpha[i] < self.c) || (r > tol && self.alpha[i] > 0.0)
    }

    /// Second-choice heuristic: the partner with the largest error gap.
    fn partner(&self, i: usize) -> Option<usize> {
        let ei = self.errors[i];
        (0..self.y.len())
            .filter(|&j| j != i)
            .max_by(|&a, &b| {
                (ei - self.errors[a])
                    .abs()
                    .partial_cmp(&(ei - self.errors[b]).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    fn take_step(&mut self, i: usize, j: usize) -> bool {
        if i == j {
            return false;
        }
        let (yi, yj) = (self.y[i], self.y[j]);
        let (ai_old, aj_old) = (self.alpha[i], self.alpha[j]);
        let (ei, ej) = (self.errors[i], self.errors[j]);

        let (lo, hi) = if yi != yj {
            ((aj_old - ai_old).max(0.0), (self.c + aj_old - ai_old).min(self.c))
        } else {
            ((ai_old + aj_old - self.c).max(0.0), (ai_old + aj_old).min(self.c))
        };
        if hi - lo < 1e-12 {
            return false;
        }

        let ki = self.kernel.row(i);
        let kj = self.kernel.row(j);
        let (kii, kij, kjj) = (ki[i], ki[j], kj[j]);
        let eta = 2.0 * kij - kii - kjj;
        if eta >= 0.0 {
            return false;
        }

        let aj = (aj_old - yj * (ei - ej) / eta).clamp(lo, hi);
        if (aj - aj_old).abs() < MIN_ALPHA_STEP {
            return false;
        }
        let ai = ai_old + yi * yj * (aj_old - aj);

        let di = yi * (ai - ai_old);
        let dj = yj * (aj - aj_old);
        let b1 = self.b - ei - di * kii - dj * kij;
        let b2 = self.b - ej - di * kij - dj * kjj;
        let b = if ai > 0.0 && ai < self.c {
            b1
        } else if aj > 0.0 && aj < self.c {
            b2
        } else {
            (b1 + b2) / 2.0
        };

        let db = b - self.b;
        for (idx, e) in self.errors.iter_mut().enumerate() {
            *e += di * ki[idx] + dj * kj[idx] + db;
        }
        self.alpha[i] = ai;
        self.alpha[j] = aj;
        self.b = b;
        true
    }

    fn examine(&mut self, i: usize) -> bool {
        if let Some(j) = self.partner(i) {
            if self.take_step(i, j) {
                return true;
            }
        }
        // Fall back to sweeping every other partner in order.
        let n = self.y.len();
        (1..n).map(|offset| (i + offset) % n).any(|j| self.take_step(i, j))
    }
}

impl SvmClassifier {
    pub fn new(c: f64, tol: f64, max_passes: usize) -> Self {
        Self { c, tol, max_passes, cache_rows: None, fitted: None }
    }

    /// Cap the number of kernel rows held during training.
    pub fn with_cache_rows(mut self, rows: usize) -> Self {
        self.cache_rows = Some(rows);
        self
    }

    /// Signed distance from the separating surface.
    pub fn decision_function(&self, x: &ArrayView1<f64>) -> Result<f64, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        check_query_width(fitted.support_vectors.ncols(), x)?;
        let sum: f64 = fitted
            .support_vectors
            .rows()
            .into_iter()
            .zip(fitted.dual_coef.iter())
            .map(|(sv, coef)| coef * rbf(&sv, x, fitted.gamma))
            .sum();
        Ok(sum + fitted.intercept)
    }
}

impl Classifier for SvmClassifier {
    fn fit(&mut self, x: &ArrayView2<f64>, y: &[u8]) -> Result<(), ModelError> {
        check_training_input(x, y)?;
        if !(self.c > 0.0) {
            return Err(ModelError::InvalidParameter {
                name: "C",
                reason: "must be positive".to_string(),
            });
        }
        if !(y.contains(&0) && y.contains(&1)) {
            return Err(ModelError::InvalidInput(
                "the number of classes has to be greater than one".to_string(),
            ));
        }

        let n = x.nrows();
        let gamma = scale_gamma(x);
        let capacity = self.cache_rows.unwrap_or_else(|| KernelCache::capacity_for(n));
        let signed: Vec<f64> = y.iter().map(|&label| if label == 1 { 1.0 } else { -1.0 }).collect();

        let mut smo = Smo {
            kernel: KernelCache::new(x.view(), gamma, capacity),
            errors: signed.iter().map(|yi| -yi).collect(),
            y: signed,
            alpha: vec![0.0; n],
            b: 0.0,
            c: self.c,
        };

        let mut passes = 0;
        let mut sweeps = 0;
        while passes < self.max_passes && sweeps < MAX_SWEEPS {
            let mut changed = 0;
            for i in 0..n {
                if smo.violates_kkt(i, self.tol) && smo.examine(i) {
                    changed += 1;
                }
            }
            passes = if changed == 0 { passes + 1 } else { 0 };
            sweeps += 1;
        }
        if sweeps == MAX_SWEEPS {
            tracing::debug!(sweeps, "SMO stopped at the sweep cap");
        }
        if !smo.b.is_finite() {
            return Err(ModelError::Numerical("intercept is not finite".to_string()));
        }

        let support: Vec<usize> = (0..n).filter(|&i| smo.alpha[i] > SUPPORT_THRESHOLD).collect();
        let support_vectors = x.select(ndarray::Axis(0), &support);
        let dual_coef = support.iter().map(|&i| smo.alpha[i] * smo.y[i]).collect();

        self.fitted = Some(Fitted {
            support_vectors,
            dual_coef,
            intercept: smo.b,
            gamma,
        });
        Ok(())
    }

    fn predict(&self, x: &ArrayView1<f64>) -> Result<u8, ModelError> {
        Ok(u8::from(self.decision_function(x)? > 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_separates_two_clusters() {
        let x = array![
            [-1.0, -1.0],
            [-1.2, -0.8],
            [-0.9, -1.1],
            [1.0, 1.0],
            [1.1, 0.9],
            [0.8, 1.2]
        ];
        let y = [0, 0, 0, 1, 1, 1];
        let mut svm = SvmClassifier::new(1.0, 1e-3, 10);
        svm.fit(&x.view(), &y).unwrap();
        for (row, &label) in x.rows().into_iter().zip(y.iter()) {
            assert_eq!(svm.predict(&row).unwrap(), label);
        }
    }

    #[test]
    fn test_two_points() {
        let x = array![[-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]];
        let mut svm = SvmClassifier::new(1.0, 1e-3, 10);
        svm.fit(&x.view(), &[0, 1]).unwrap();
        assert_eq!(svm.predict(&array![-1.0, -1.0, -1.0].view()).unwrap(), 0);
        assert_eq!(svm.predict(&array![1.0, 1.0, 1.0].view()).unwrap(), 1);
    }

    #[test]
    fn test_has_no_probability_model() {
        let x = array![[0.0], [1.0]];
        let mut svm = SvmClassifier::new(1.0, 1e-3, 10);
        svm.fit(&x.view(), &[0, 1]).unwrap();
        assert!(svm.predict_proba(&array![0.5].view()).is_none());
    }

    #[test]
    fn test_single_class_rejected() {
        let x = array![[0.0], [1.0]];
        let mut svm = SvmClassifier::new(1.0, 1e-3, 10);
        assert!(matches!(svm.fit(&x.view(), &[1, 1]), Err(ModelError::InvalidInput(_))));
    }

    #[test]
    fn test_small_kernel_cache_still_separates() {
        let x = array![
            [-1.0, -1.0],
            [-1.2, -0.8],
            [-0.9, -1.1],
            [-1.1, -1.0],
            [1.0, 1.0],
            [1.1, 0.9],
            [0.8, 1.2],
            [0.9, 1.0]
        ];
        let y = [0, 0, 0, 0, 1, 1, 1, 1];
        let mut svm = SvmClassifier::new(1.0, 1e-3, 10).with_cache_rows(2);
        svm.fit(&x.view(), &y).unwrap();
        for (row, &label) in x.rows().into_iter().zip(y.iter()) {
            assert_eq!(svm.predict(&row).unwrap(), label);
        }
    }

    #[test]
    fn test_kernel_cache_is_bounded() {
        let x = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let mut cache = KernelCache::new(x.view(), 0.5, 2);
        for i in [0, 1, 2, 3, 0, 2] {
            let row = cache.row(i);
            assert_eq!(row.len(), 4);
            assert!((row[i] - 1.0).abs() < 1e-12);
            assert!(cache.len() <= 2);
        }
        let row = cache.row(1);
        assert!((row[3] - rbf(&x.row(1), &x.row(3), 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_cache_capacity_follows_budget() {
        assert_eq!(KernelCache::capacity_for(10), 10);
        let n = 100_000;
        let rows = KernelCache::capacity_for(n);
        assert!(rows * n * std::mem::size_of::<f64>() <= KERNEL_CACHE_BYTES);
        assert!(rows >= 2);
    }

    #[test]
    fn test_gamma_falls_back_for_constant_input() {
        assert_eq!(scale_gamma(&array![[2.0, 2.0], [2.0, 2.0]].view()), 1.0);
        let gamma = scale_gamma(&array![[-1.0, 1.0], [1.0, -1.0]].view());
        assert!((gamma - 0.5).abs() < 1e-12);
    }
}
