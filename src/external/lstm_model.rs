//! Forward pass for stacked-LSTM forecasters exported as JSON weights.
//!
//! Weight layout follows Keras: `kernel` is `[inputs, 4 * units]`,
//! `recurrent_kernel` is `[units, 4 * units]`, `bias` is `[4 * units]`, and the
//! four gate blocks are ordered input, forget, cell, output.

use ndarray::{s, Array1, Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::external::model_provider::{ForecastModel, ModelProviderError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmArtifact {
    pub input_features: usize,
    pub lstm_layers: Vec<LstmLayerWeights>,
    pub dense_layers: Vec<DenseWeights>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmLayerWeights {
    pub kernel: Vec<Vec<f64>>,
    pub recurrent_kernel: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseWeights {
    pub kernel: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
}

#[derive(Debug, Clone)]
struct LstmLayer {
    units: usize,
    kernel: Array2<f64>,
    recurrent: Array2<f64>,
    bias: Array1<f64>,
}

#[derive(Debug, Clone)]
struct DenseLayer {
    kernel: Array2<f64>,
    bias: Array1<f64>,
    activation: Activation,
}

#[derive(Debug, Clone)]
pub struct LstmModel {
    input_features: usize,
    lstm: Vec<LstmLayer>,
    dense: Vec<DenseLayer>,
}

impl LstmModel {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ModelProviderError> {
        let artifact: LstmArtifact = serde_json::from_slice(bytes)
            .map_err(|e| ModelProviderError::InvalidArtifact(e.to_string()))?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: LstmArtifact) -> Result<Self, ModelProviderError> {
        if artifact.lstm_layers.is_empty() {
            return Err(invalid("at least one LSTM layer is required"));
        }

        let mut inputs = artifact.input_features;
        let mut lstm = Vec::with_capacity(artifact.lstm_layers.len());
        for (idx, weights) in artifact.lstm_layers.into_iter().enumerate() {
            let kernel = to_matrix(weights.kernel, &format!("lstm[{}].kernel", idx))?;
            let recurrent =
                to_matrix(weights.recurrent_kernel, &format!("lstm[{}].recurrent_kernel", idx))?;
            let units = recurrent.nrows();

            if units == 0 || kernel.dim() != (inputs, 4 * units) {
                return Err(invalid(&format!(
                    "lstm[{}].kernel is {:?}, expected ({}, {})",
                    idx,
                    kernel.dim(),
                    inputs,
                    4 * units
                )));
            }
            if recurrent.ncols() != 4 * units || weights.bias.len() != 4 * units {
                return Err(invalid(&format!(
                    "lstm[{}] recurrent kernel or bias does not match {} units",
                    idx, units
                )));
            }

            lstm.push(LstmLayer {
                units,
                kernel,
                recurrent,
                bias: Array1::from(weights.bias),
            });
            inputs = units;
        }

        let mut dense = Vec::with_capacity(artifact.dense_layers.len());
        for (idx, weights) in artifact.dense_layers.into_iter().enumerate() {
            let kernel = to_matrix(weights.kernel, &format!("dense[{}].kernel", idx))?;
            if kernel.nrows() != inputs || weights.bias.len() != kernel.ncols() {
                return Err(invalid(&format!(
                    "dense[{}] is {:?} with bias {}, expected {} inputs",
                    idx,
                    kernel.dim(),
                    weights.bias.len(),
                    inputs
                )));
            }
            inputs = kernel.ncols();
            dense.push(DenseLayer {
                kernel,
                bias: Array1::from(weights.bias),
                activation: weights.activation,
            });
        }

        if inputs != 1 {
            return Err(invalid(&format!(
                "final layer must produce 1 output, produces {}",
                inputs
            )));
        }

        Ok(Self {
            input_features: artifact.input_features,
            lstm,
            dense,
        })
    }

    fn forward_one(&self, sequence: ArrayView2<f64>) -> f64 {
        let mut seq = sequence.to_owned();
        for layer in &self.lstm {
            seq = layer.run(seq.view());
        }

        let last = seq.nrows() - 1;
        let mut out = seq.row(last).to_owned();
        for layer in &self.dense {
            out = layer.apply(&out);
        }
        out[0]
    }
}

impl LstmLayer {
    /// Returns the hidden state at every step, `(steps, units)`.
    fn run(&self, sequence: ArrayView2<f64>) -> Array2<f64> {
        let h_units = self.units;
        let mut h = Array1::<f64>::zeros(h_units);
        let mut c = Array1::<f64>::zeros(h_units);
        let mut outputs = Array2::zeros((sequence.nrows(), h_units));

        for (t, x) in sequence.axis_iter(Axis(0)).enumerate() {
            let z = x.dot(&self.kernel) + h.dot(&self.recurrent) + &self.bias;

            let i = z.slice(s![0..h_units]).mapv(sigmoid);
            let f = z.slice(s![h_units..2 * h_units]).mapv(sigmoid);
            let g = z.slice(s![2 * h_units..3 * h_units]).mapv(f64::tanh);
            let o = z.slice(s![3 * h_units..4 * h_units]).mapv(sigmoid);

            c = &f * &c + &i * &g;
            h = &o * &c.mapv(f64::tanh);
            outputs.row_mut(t).assign(&h);
        }

        outputs
    }
}

impl DenseLayer {
    fn apply(&self, input: &Array1<f64>) -> Array1<f64> {
        let out = input.dot(&self.kernel) + &self.bias;
        match self.activation {
            Activation::Linear => out,
            Activation::Relu => out.mapv(|v| v.max(0.0)),
        }
    }
}

impl ForecastModel for LstmModel {
    fn input_features(&self) -> usize {
        self.input_features
    }

    fn predict(&self, batch: &Array3<f64>) -> Result<Array1<f64>, ModelProviderError> {
        let (_, steps, features) = batch.dim();
        if features != self.input_features {
            return Err(ModelProviderError::Shape(format!(
                "model expects {} features per step, got {}",
                self.input_features, features
            )));
        }
        if steps == 0 {
            return Err(ModelProviderError::Shape("empty input sequence".to_string()));
        }

        Ok(batch
            .axis_iter(Axis(0))
            .map(|sequence| self.forward_one(sequence))
            .collect())
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn invalid(msg: &str) -> ModelProviderError {
    ModelProviderError::InvalidArtifact(msg.to_string())
}

fn to_matrix(rows: Vec<Vec<f64>>, name: &str) -> Result<Array2<f64>, ModelProviderError> {
    let n_rows = rows.len();
    let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
    if rows.iter().any(|r| r.len() != n_cols) {
        return Err(invalid(&format!("{} has ragged rows", name)));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_rows, n_cols), flat)
        .map_err(|e| invalid(&format!("{}: {}", name, e)))
}
