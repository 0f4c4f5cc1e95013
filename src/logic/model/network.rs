//! Bottleneck Reconstruction Network
//!
//! Small dense autoencoder trained in-process on the standardized batch:
//!
//! ```text
//! input ─► 16 (relu, dropout) ─► 8 (relu) ─► bottleneck (relu)
//!       ─► 8 (relu, dropout) ─► 16 (relu) ─► input (linear)
//! ```
//!
//! Mean squared reconstruction loss, Adam, shuffled mini-batches, early
//! stopping on the training loss with best-weight restore.

use ndarray::{Array1, Array2, Axis, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-7;
const DROPOUT_RATE: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Linear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
    pub activation: Activation,
    /// Dropout applied to this layer's output while training
    pub dropout: f64,
}

impl Dense {
    /// Glorot-uniform weights, zero bias
    fn new(inputs: usize, outputs: usize, activation: Activation, dropout: f64, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        Self {
            weights: Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-limit..limit)),
            bias: Array1::zeros(outputs),
            activation,
            dropout,
        }
    }

    fn pre_activation(&self, input: &Array2<f64>) -> Array2<f64> {
        let mut z = input.dot(&self.weights);
        z += &self.bias;
        z
    }

    fn activate(&self, z: &Array2<f64>) -> Array2<f64> {
        match self.activation {
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Linear => z.clone(),
        }
    }

    fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        self.activate(&self.pre_activation(input))
    }
}

/// Values cached by a training forward pass
struct LayerTrace {
    input: Array2<f64>,
    z: Array2<f64>,
    mask: Option<Array2<f64>>,
}

struct LayerGrad {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

/// Adam moment estimates per layer
struct Adam {
    learning_rate: f64,
    step: i32,
    m_w: Vec<Array2<f64>>,
    v_w: Vec<Array2<f64>>,
    m_b: Vec<Array1<f64>>,
    v_b: Vec<Array1<f64>>,
}

impl Adam {
    fn new(layers: &[Dense], learning_rate: f64) -> Self {
        Self {
            learning_rate,
            step: 0,
            m_w: layers.iter().map(|l| Array2::zeros(l.weights.raw_dim())).collect(),
            v_w: layers.iter().map(|l| Array2::zeros(l.weights.raw_dim())).collect(),
            m_b: layers.iter().map(|l| Array1::zeros(l.bias.raw_dim())).collect(),
            v_b: layers.iter().map(|l| Array1::zeros(l.bias.raw_dim())).collect(),
        }
    }

    fn apply(&mut self, layers: &mut [Dense], grads: &[LayerGrad]) {
        self.step += 1;
        let lr = self.learning_rate;
        let correction1 = 1.0 - ADAM_BETA1.powi(self.step);
        let correction2 = 1.0 - ADAM_BETA2.powi(self.step);

        let update = |param: f64, m: f64, v: f64| {
            param - lr * (m / correction1) / ((v / correction2).sqrt() + ADAM_EPSILON)
        };

        for (i, (layer, grad)) in layers.iter_mut().zip(grads).enumerate() {
            Zip::from(&mut self.m_w[i])
                .and(&mut self.v_w[i])
                .and(&grad.weights)
                .for_each(|m, v, &g| {
                    *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
                    *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
                });
            Zip::from(&mut layer.weights)
                .and(&self.m_w[i])
                .and(&self.v_w[i])
                .for_each(|w, &m, &v| *w = update(*w, m, v));

            Zip::from(&mut self.m_b[i])
                .and(&mut self.v_b[i])
                .and(&grad.bias)
                .for_each(|m, v, &g| {
                    *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
                    *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
                });
            Zip::from(&mut layer.bias)
                .and(&self.m_b[i])
                .and(&self.v_b[i])
                .for_each(|b, &m, &v| *b = update(*b, m, v));
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub patience: usize,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub best_loss: f64,
    pub stopped_early: bool,
}

/// Tracks the best epoch and keeps a snapshot of it
#[derive(Debug, Clone)]
pub struct EarlyStopping<T> {
    patience: usize,
    best_loss: f64,
    best: Option<T>,
    wait: usize,
}

impl<T: Clone> EarlyStopping<T> {
    pub fn new(patience: usize) -> Self {
        Self { patience, best_loss: f64::INFINITY, best: None, wait: 0 }
    }

    /// Record one epoch. Returns true once `patience` epochs passed without
    /// a strictly lower loss.
    pub fn observe(&mut self, loss: f64, snapshot: &T) -> bool {
        if loss < self.best_loss {
            self.best_loss = loss;
            self.best = Some(snapshot.clone());
            self.wait = 0;
            false
        } else {
            self.wait += 1;
            self.wait >= self.patience
        }
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    /// Snapshot of the best epoch, `None` before any finite loss
    pub fn into_best(self) -> Option<T> {
        self.best
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructionNetwork {
    layers: Vec<Dense>,
}

impl ReconstructionNetwork {
    /// Symmetric encoder/decoder around an `encoding_dim` bottleneck
    pub fn bottleneck(input_dim: usize, encoding_dim: usize, rng: &mut StdRng) -> Self {
        let encoding_dim = encoding_dim.max(1);
        let layers = vec![
            Dense::new(input_dim, 16, Activation::Relu, DROPOUT_RATE, rng),
            Dense::new(16, 8, Activation::Relu, 0.0, rng),
            Dense::new(8, encoding_dim, Activation::Relu, 0.0, rng),
            Dense::new(encoding_dim, 8, Activation::Relu, DROPOUT_RATE, rng),
            Dense::new(8, 16, Activation::Relu, 0.0, rng),
            Dense::new(16, input_dim, Activation::Linear, 0.0, rng),
        ];
        Self { layers }
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map(|l| l.weights.nrows()).unwrap_or(0)
    }

    /// Inference pass (no dropout)
    pub fn reconstruct(&self, input: &Array2<f64>) -> Array2<f64> {
        self.layers
            .iter()
            .fold(input.clone(), |activation, layer| layer.forward(&activation))
    }

    /// Per-row mean squared reconstruction error
    pub fn reconstruction_errors(&self, input: &Array2<f64>) -> Vec<f64> {
        let reconstructed = self.reconstruct(input);
        let cols = input.ncols().max(1) as f64;
        (input - &reconstructed)
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|d| d * d).sum::<f64>() / cols)
            .collect()
    }

    pub fn train(&mut self, data: &Array2<f64>, config: &TrainingConfig, rng: &mut StdRng) -> TrainingReport {
        let n = data.nrows();
        let batch_size = config.batch_size.max(1);
        let mut optimizer = Adam::new(&self.layers, config.learning_rate);
        let mut indices: Vec<usize> = (0..n).collect();

        let mut stopping = EarlyStopping::new(config.patience);
        let mut epochs_run = 0;
        let mut stopped_early = false;

        for epoch in 0..config.epochs {
            indices.shuffle(rng);
            let mut epoch_loss = 0.0;

            for chunk in indices.chunks(batch_size) {
                let batch = data.select(Axis(0), chunk);
                let loss = self.train_batch(&batch, &mut optimizer, rng);
                epoch_loss += loss * chunk.len() as f64;
            }
            epoch_loss /= n.max(1) as f64;
            epochs_run = epoch + 1;

            if stopping.observe(epoch_loss, &self.layers) {
                stopped_early = true;
                break;
            }
        }

        let best_loss = stopping.best_loss();
        if let Some(best) = stopping.into_best() {
            self.layers = best;
        }
        TrainingReport { epochs_run, best_loss, stopped_early }
    }

    /// One optimizer step, returns the batch loss before the update
    fn train_batch(&mut self, batch: &Array2<f64>, optimizer: &mut Adam, rng: &mut StdRng) -> f64 {
        let mut traces = Vec::with_capacity(self.layers.len());
        let mut activation = batch.clone();

        for layer in &self.layers {
            let z = layer.pre_activation(&activation);
            let mut output = layer.activate(&z);
            let mask = (layer.dropout > 0.0).then(|| {
                let keep = 1.0 - layer.dropout;
                Array2::from_shape_fn(output.raw_dim(), |_| {
                    if rng.gen::<f64>() < layer.dropout { 0.0 } else { 1.0 / keep }
                })
            });
            if let Some(mask) = &mask {
                output *= mask;
            }
            traces.push(LayerTrace { input: activation, z, mask });
            activation = output;
        }

        let diff = &activation - batch;
        let count = diff.len().max(1) as f64;
        let loss = diff.iter().map(|d| d * d).sum::<f64>() / count;

        // dL/d(output) of the mean squared error
        let mut grad = diff * (2.0 / count);
        let mut grads = Vec::with_capacity(self.layers.len());

        for (layer, trace) in self.layers.iter().zip(traces.iter()).rev() {
            if let Some(mask) = &trace.mask {
                grad *= mask;
            }
            if layer.activation == Activation::Relu {
                Zip::from(&mut grad)
                    .and(&trace.z)
                    .for_each(|g, &z| if z <= 0.0 { *g = 0.0 });
            }

            grads.push(LayerGrad {
                weights: trace.input.t().dot(&grad),
                bias: grad.sum_axis(Axis(0)),
            });
            grad = grad.dot(&layer.weights.t());
        }
        grads.reverse();

        optimizer.apply(&mut self.layers, &grads);
        loss
    }
}
