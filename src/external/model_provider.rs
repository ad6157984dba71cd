use std::sync::Arc;

use async_trait::async_trait;
use ndarray::{Array1, Array3};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelProviderError {
    #[error("model not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("shape mismatch: {0}")]
    Shape(String),
}

/// A loaded, ready-to-run forecasting model.
///
/// `predict` takes `(batch, steps, features)` normalized windows and returns
/// one normalized close value per window. Implementations must be
/// deterministic for fixed weights.
pub trait ForecastModel: Send + Sync {
    fn input_features(&self) -> usize;

    fn predict(&self, batch: &Array3<f64>) -> Result<Array1<f64>, ModelProviderError>;
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Resolve and load the model for an instrument identifier.
    async fn load(&self, model_id: &str) -> Result<Arc<dyn ForecastModel>, ModelProviderError>;
}

/// Artifact name for an instrument, e.g. `aapl` -> `AAPL.json`.
pub fn artifact_name(model_id: &str) -> String {
    format!("{}.json", model_id.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_name_uppercases() {
        assert_eq!(artifact_name("msft"), "MSFT.json");
        assert_eq!(artifact_name("BRK.B"), "BRK.B.json");
    }
}
