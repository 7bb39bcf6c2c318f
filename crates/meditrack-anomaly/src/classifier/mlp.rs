//! Multi-layer perceptron: ReLU hidden layers, a logistic output unit,
//! log-loss with an L2 penalty, optimised by mini-batch Adam.

use ndarray::{Array, Array1, Array2, ArrayView1, ArrayView2, Axis, Dimension, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{check_query_width, check_training_input, Classifier, ModelError};

const BATCH_SIZE: usize = 200;
const BETA_1: f64 = 0.9;
const BETA_2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;
/// Minimum loss improvement that resets the patience counter.
const TOL: f64 = 1e-4;
const N_ITER_NO_CHANGE: usize = 10;
const PROBA_CLIP: f64 = 1e-15;

#[derive(Debug, Clone)]
struct Layer {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

/// First and second moment estimates for every parameter.
struct Adam {
    m_w: Vec<Array2<f64>>,
    v_w: Vec<Array2<f64>>,
    m_b: Vec<Array1<f64>>,
    v_b: Vec<Array1<f64>>,
    t: i32,
}

impl Adam {
    fn new(layers: &[Layer]) -> Self {
        Self {
            m_w: layers.iter().map(|l| Array2::zeros(l.weights.raw_dim())).collect(),
            v_w: layers.iter().map(|l| Array2::zeros(l.weights.raw_dim())).collect(),
            m_b: layers.iter().map(|l| Array1::zeros(l.bias.raw_dim())).collect(),
            v_b: layers.iter().map(|l| Array1::zeros(l.bias.raw_dim())).collect(),
            t: 0,
        }
    }

    fn update(&mut self, layers: &mut [Layer], grads: &[(Array2<f64>, Array1<f64>)], learning_rate: f64) {
        self.t += 1;
        let step = learning_rate * (1.0 - BETA_2.powi(self.t)).sqrt() / (1.0 - BETA_1.powi(self.t));
        for (idx, (layer, (grad_w, grad_b))) in layers.iter_mut().zip(grads).enumerate() {
            adam_step(&mut layer.weights, grad_w, &mut self.m_w[idx], &mut self.v_w[idx], step);
            adam_step(&mut layer.bias, grad_b, &mut self.m_b[idx], &mut self.v_b[idx], step);
        }
    }
}

fn adam_step<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    step: f64,
) {
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = BETA_1 * *m + (1.0 - BETA_1) * g;
            *v = BETA_2 * *v + (1.0 - BETA_2) * g * g;
            *p -= step * *m / (v.sqrt() + ADAM_EPSILON);
        });
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Debug, Clone)]
pub struct MlpClassifier {
    hidden: Vec<usize>,
    learning_rate: f64,
    alpha: f64,
    max_iter: usize,
    seed: u64,
    n_features: usize,
    layers: Option<Vec<Layer>>,
    n_iter: usize,
}

impl MlpClassifier {
    pub fn new(hidden: Vec<usize>, learning_rate: f64, alpha: f64, max_iter: usize, seed: u64) -> Self {
        Self {
            hidden,
            learning_rate,
            alpha,
            max_iter,
            seed,
            n_features: 0,
            layers: None,
            n_iter: 0,
        }
    }

    /// Epochs run by the last `fit`.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Glorot-uniform initialisation; the logistic output layer uses the
    /// narrower factor.
    fn init_layers(&self, n_features: usize, rng: &mut StdRng) -> Vec<Layer> {
        let mut sizes = vec![n_features];
        sizes.extend(&self.hidden);
        sizes.push(1);

        let n_layers = sizes.len() - 1;
        sizes
            .windows(2)
            .enumerate()
            .map(|(idx, pair)| {
                let (fan_in, fan_out) = (pair[0], pair[1]);
                let factor = if idx + 1 == n_layers { 2.0 } else { 6.0 };
                let bound = (factor / (fan_in + fan_out) as f64).sqrt();
                Layer {
                    weights: Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-bound..bound)),
                    bias: Array1::from_shape_fn(fan_out, |_| rng.gen_range(-bound..bound)),
                }
            })
            .collect()
    }

    /// Activations of every layer, input first.
    fn forward(layers: &[Layer], x: ArrayView2<f64>) -> Vec<Array2<f64>> {
        let mut activations = vec![x.to_owned()];
        for (idx, layer) in layers.iter().enumerate() {
            let z = activations[idx].dot(&layer.weights) + &layer.bias;
            let a = if idx + 1 == layers.len() {
                z.mapv(sigmoid)
            } else {
                z.mapv(|v| v.max(0.0))
            };
            activations.push(a);
        }
        activations
    }

    /// Penalised log-loss of one batch and the gradient of every layer.
    fn backward(
        &self,
        layers: &[Layer],
        activations: &[Array2<f64>],
        target: &Array2<f64>,
    ) -> (f64, Vec<(Array2<f64>, Array1<f64>)>) {
        let batch = target.nrows() as f64;
        let output = &activations[layers.len()];

        let log_loss: f64 = output
            .iter()
            .zip(target.iter())
            .map(|(&p, &y)| {
                let p = p.clamp(PROBA_CLIP, 1.0 - PROBA_CLIP);
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum::<f64>()
            / batch;
        let l2: f64 = layers.iter().map(|l| l.weights.mapv(|w| w * w).sum()).sum();
        let loss = log_loss + 0.5 * self.alpha * l2 / batch;

        let mut grads = Vec::with_capacity(layers.len());
        let mut delta = output - target;
        for idx in (0..layers.len()).rev() {
            let grad_w = activations[idx].t().dot(&delta) / batch + &(&layers[idx].weights * (self.alpha / batch));
            let grad_b = delta.sum_axis(Axis(0)) / batch;
            if idx > 0 {
                let mut next = delta.dot(&layers[idx].weights.t());
                next.zip_mut_with(&activations[idx], |d, &a| {
                    if a <= 0.0 {
                        *d = 0.0;
                    }
                });
                delta = next;
            }
            grads.push((grad_w, grad_b));
        }
        grads.reverse();
        (loss, grads)
    }

    fn probability(&self, x: &ArrayView1<f64>) -> Result<f64, ModelError> {
        let layers = self.layers.as_ref().ok_or(ModelError::NotFitted)?;
        check_query_width(self.n_features, x)?;
        let activations = Self::forward(layers, x.view().insert_axis(Axis(0)));
        Ok(activations[layers.len()][[0, 0]])
    }
}

impl Classifier for MlpClassifier {
    fn fit(&mut self, x: &ArrayView2<f64>, y: &[u8]) -> Result<(), ModelError> {
        check_training_input(x, y)?;
        if self.hidden.is_empty() || self.hidden.contains(&0) {
            return Err(ModelError::InvalidParameter {
                name: "hidden_layer_sizes",
                reason: "every layer needs at least one unit".to_string(),
            });
        }

        let n = x.nrows();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut layers = self.init_layers(x.ncols(), &mut rng);
        let mut adam = Adam::new(&layers);
        let batch_size = BATCH_SIZE.min(n);
        let mut indices: Vec<usize> = (0..n).collect();

        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0;
        let mut epochs = 0;
        while epochs < self.max_iter {
            epochs += 1;
            indices.shuffle(&mut rng);

            let mut epoch_loss = 0.0;
            for batch in indices.chunks(batch_size) {
                let xb = x.select(Axis(0), batch);
                let target = Array2::from_shape_fn((batch.len(), 1), |(r, _)| f64::from(y[batch[r]]));
                let activations = Self::forward(&layers, xb.view());
                let (loss, grads) = self.backward(&layers, &activations, &target);
                adam.update(&mut layers, &grads, self.learning_rate);
                epoch_loss += loss * batch.len() as f64;
            }
            epoch_loss /= n as f64;

            if !epoch_loss.is_finite() {
                return Err(ModelError::Numerical(format!("loss diverged at epoch {epochs}")));
            }
            if epoch_loss > best_loss - TOL {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            best_loss = best_loss.min(epoch_loss);
            if no_improvement > N_ITER_NO_CHANGE {
                break;
            }
        }

        if epochs == self.max_iter {
            tracing::debug!(epochs, loss = best_loss, "MLP reached max_iter before converging");
        }
        self.n_features = x.ncols();
        self.layers = Some(layers);
        self.n_iter = epochs;
        Ok(())
    }

    fn predict(&self, x: &ArrayView1<f64>) -> Result<u8, ModelError> {
        Ok(u8::from(self.probability(x)? > 0.5))
    }

    fn predict_proba(&self, x: &ArrayView1<f64>) -> Option<Result<[f64; 2], ModelError>> {
        Some(self.probability(x).map(|p| [1.0 - p, p]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn clusters() -> (Array2<f64>, Vec<u8>) {
        let x = array![
            [-1.0, -1.0],
            [-1.2, -0.8],
            [-0.9, -1.1],
            [-1.1, -0.9],
            [1.0, 1.0],
            [1.1, 0.9],
            [0.8, 1.2],
            [0.9, 1.1]
        ];
        (x, vec![0, 0, 0, 0, 1, 1, 1, 1])
    }

    #[test]
    fn test_learns_separable_clusters() {
        let (x, y) = clusters();
        let mut mlp = MlpClassifier::new(vec![16], 1e-2, 1e-4, 500, 7);
        mlp.fit(&x.view(), &y).unwrap();
        for (row, &label) in x.rows().into_iter().zip(y.iter()) {
            assert_eq!(mlp.predict(&row).unwrap(), label);
        }
    }

    #[test]
    fn test_same_seed_same_model() {
        let (x, y) = clusters();
        let query = array![0.2, -0.1];
        let mut a = MlpClassifier::new(vec![8, 4], 1e-3, 1e-4, 50, 42);
        let mut b = MlpClassifier::new(vec![8, 4], 1e-3, 1e-4, 50, 42);
        a.fit(&x.view(), &y).unwrap();
        b.fit(&x.view(), &y).unwrap();
        let pa = a.predict_proba(&query.view()).unwrap().unwrap();
        let pb = b.predict_proba(&query.view()).unwrap().unwrap();
        assert_eq!(pa, pb);
        assert!((pa[0] + pa[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_respects_max_iter() {
        let (x, y) = clusters();
        let mut mlp = MlpClassifier::new(vec![4], 1e-3, 1e-4, 3, 1);
        mlp.fit(&x.view(), &y).unwrap();
        assert!(mlp.n_iter() <= 3);
    }

    #[test]
    fn test_rejects_empty_layer() {
        let (x, y) = clusters();
        let mut mlp = MlpClassifier::new(vec![0], 1e-3, 1e-4, 3, 1);
        assert!(matches!(mlp.fit(&x.view(), &y), Err(ModelError::InvalidParameter { .. })));
    }
}
