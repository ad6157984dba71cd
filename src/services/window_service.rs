use ndarray::{s, Array1, Array2, Array3, Axis};

use crate::config::PipelineConfig;
use crate::errors::AppError;
use crate::models::Feature;

/// Windows stacked as `(batch, window_length, features)` with one target per
/// window when a following day exists.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowBatch {
    pub inputs: Array3<f64>,
    pub targets: Option<Array1<f64>>,
}

impl WindowBatch {
    pub fn len(&self) -> usize {
        self.inputs.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Slides a fixed-length frame over a `(rows, features)` matrix.
#[derive(Debug, Clone, Copy)]
pub struct FeatureWindower {
    window_length: usize,
    min_rows: usize,
}

impl FeatureWindower {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            window_length: config.window_length,
            min_rows: config.min_rows(),
        }
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    /// Fails unless there is at least one full window plus a following row.
    pub fn ensure_sufficient(&self, rows: usize) -> Result<(), AppError> {
        if rows < self.min_rows {
            return Err(AppError::InsufficientData {
                required: self.min_rows,
                got: rows,
            });
        }
        Ok(())
    }

    /// The single deployed window: exactly `rows[N - W .. N]`.
    ///
    /// Only the most recent `W` rows are read; anything older can change the
    /// scaler fit but never the window contents.
    pub fn forecast_batch(&self, matrix: &Array2<f64>) -> Result<WindowBatch, AppError> {
        let n = matrix.nrows();
        self.ensure_sufficient(n)?;

        let frame = matrix.slice(s![n - self.window_length..n, ..]).to_owned();
        Ok(WindowBatch {
            inputs: frame.insert_axis(Axis(0)),
            targets: None,
        })
    }

    /// Every `(rows[i - W .. i], rows[i][close])` pair for `i` in `[W, N)`.
    pub fn training_pairs(&self, matrix: &Array2<f64>) -> Result<WindowBatch, AppError> {
        let (n, features) = matrix.dim();
        self.ensure_sufficient(n)?;

        let w = self.window_length;
        let count = n - w;
        let mut inputs = Array3::zeros((count, w, features));
        let mut targets = Array1::zeros(count);

        for (k, i) in (w..n).enumerate() {
            inputs
                .index_axis_mut(Axis(0), k)
                .assign(&matrix.slice(s![i - w..i, ..]));
            targets[k] = matrix[[i, Feature::Close.index()]];
        }

        Ok(WindowBatch {
            inputs,
            targets: Some(targets),
        })
    }
}
