use std::sync::Arc;
use std::time::{Duration, Instant};

use ndarray::{Array1, Array3};
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::errors::AppError;
use crate::external::model_provider::{ForecastModel, ModelProvider};

/// Loads the model for an instrument and runs one batch through it under a
/// single deadline covering both load and forward pass.
///
/// A forward pass already running on the blocking pool is not cancelled when
/// the deadline fires. It runs to completion, logs at `debug` that it finished
/// late, and its output is discarded.
#[derive(Clone)]
pub struct InferenceInvoker {
    provider: Arc<dyn ModelProvider>,
    timeout: Duration,
    config: PipelineConfig,
}

impl InferenceInvoker {
    pub fn new(provider: Arc<dyn ModelProvider>, timeout: Duration, config: PipelineConfig) -> Self {
        Self {
            provider,
            timeout,
            config,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns one normalized close prediction per window in `batch`.
    pub async fn predict(&self, model_id: &str, batch: Array3<f64>) -> Result<Array1<f64>, AppError> {
        self.check_shape(&batch)?;

        let started = Instant::now();
        let deadline = started + self.timeout;
        let result =
            tokio::time::timeout(self.timeout, self.load_and_run(model_id, batch, deadline)).await;

        match result {
            Ok(outcome) => {
                if outcome.is_ok() {
                    info!(
                        "Inference for {} finished in {} ms",
                        model_id,
                        started.elapsed().as_millis()
                    );
                }
                outcome
            }
            Err(_) => {
                warn!("Inference for {} exceeded {:?}", model_id, self.timeout);
                Err(AppError::InferenceTimeout(self.timeout))
            }
        }
    }

    async fn load_and_run(
        &self,
        model_id: &str,
        batch: Array3<f64>,
        deadline: Instant,
    ) -> Result<Array1<f64>, AppError> {
        let model = self.provider.load(model_id).await.map_err(|e| {
            error!("Failed to load model {}: {}", model_id, e);
            AppError::from(e)
        })?;

        if model.input_features() != self.config.feature_count {
            return Err(AppError::ModelUnavailable(format!(
                "model {} expects {} features, pipeline produces {}",
                model_id,
                model.input_features(),
                self.config.feature_count
            )));
        }

        let expected = batch.shape()[0];
        let predictions = run_blocking(model_id.to_string(), model, batch, deadline).await?;

        if predictions.len() != expected {
            return Err(AppError::Inference(format!(
                "model returned {} predictions for {} windows",
                predictions.len(),
                expected
            )));
        }
        if predictions.iter().any(|v| !v.is_finite()) {
            return Err(AppError::Inference("model produced a non-finite value".to_string()));
        }

        Ok(predictions)
    }

    fn check_shape(&self, batch: &Array3<f64>) -> Result<(), AppError> {
        let (n, steps, features) = batch.dim();
        if n == 0 || steps != self.config.window_length || features != self.config.feature_count {
            return Err(AppError::Schema(format!(
                "batch shape ({}, {}, {}) does not match model input (N, {}, {})",
                n, steps, features, self.config.window_length, self.config.feature_count
            )));
        }
        Ok(())
    }
}

async fn run_blocking(
    model_id: String,
    model: Arc<dyn ForecastModel>,
    batch: Array3<f64>,
    deadline: Instant,
) -> Result<Array1<f64>, AppError> {
    tokio::task::spawn_blocking(move || {
        let output = model.predict(&batch);
        let now = Instant::now();
        if now > deadline {
            debug!(
                "Forward pass for {} finished {} ms past its deadline; output discarded",
                model_id,
                (now - deadline).as_millis()
            );
        }
        output
    })
        .await
        .map_err(|e| AppError::Inference(format!("inference task failed: {}", e)))?
        .map_err(|e| AppError::Inference(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::model_provider::ModelProviderError;
    use async_trait::async_trait;

    struct MeanCloseModel;

    impl ForecastModel for MeanCloseModel {
        fn input_features(&self) -> usize {
            5
        }

        fn predict(&self, batch: &Array3<f64>) -> Result<Array1<f64>, ModelProviderError> {
            Ok(batch
                .outer_iter()
                .map(|w| w.column(0).mean().unwrap_or(0.0))
                .collect())
        }
    }

    struct StaticProvider(Arc<dyn ForecastModel>);

    #[async_trait]
    impl ModelProvider for StaticProvider {
        async fn load(&self, _: &str) -> Result<Arc<dyn ForecastModel>, ModelProviderError> {
            Ok(self.0.clone())
        }
    }

    struct MissingProvider;

    #[async_trait]
    impl ModelProvider for MissingProvider {
        async fn load(&self, id: &str) -> Result<Arc<dyn ForecastModel>, ModelProviderError> {
            Err(ModelProviderError::NotFound(id.to_string()))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl ModelProvider for SlowProvider {
        async fn load(&self, _: &str) -> Result<Arc<dyn ForecastModel>, ModelProviderError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Arc::new(MeanCloseModel))
        }
    }

    /// Blocks the worker thread, then records that it ran to the end.
    struct StallingModel(Arc<std::sync::atomic::AtomicBool>);

    impl ForecastModel for StallingModel {
        fn input_features(&self) -> usize {
            5
        }

        fn predict(&self, batch: &Array3<f64>) -> Result<Array1<f64>, ModelProviderError> {
            std::thread::sleep(Duration::from_millis(150));
            self.0.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(Array1::zeros(batch.shape()[0]))
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::new(4, 5).unwrap()
    }

    #[tokio::test]
    async fn test_one_prediction_per_window() {
        let invoker = InferenceInvoker::new(
            Arc::new(StaticProvider(Arc::new(MeanCloseModel))),
            Duration::from_secs(1),
            config(),
        );
        let batch = Array3::from_shape_fn((3, 4, 5), |(b, _, _)| b as f64);
        let out = invoker.predict("AAPL", batch).await.unwrap();
        assert_eq!(out.to_vec(), vec![0.0, 1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_missing_model_is_unavailable() {
        let invoker = InferenceInvoker::new(Arc::new(MissingProvider), Duration::from_secs(1), config());
        let err = invoker.predict("AAPL", Array3::zeros((1, 4, 5))).await.unwrap_err();
        assert!(matches!(err, AppError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let invoker =
            InferenceInvoker::new(Arc::new(SlowProvider), Duration::from_millis(20), config());
        let err = invoker.predict("AAPL", Array3::zeros((1, 4, 5))).await.unwrap_err();
        assert!(matches!(err, AppError::InferenceTimeout(d) if d == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_slow_forward_pass_times_out_and_finishes_detached() {
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let model = Arc::new(StallingModel(finished.clone()));
        let invoker = InferenceInvoker::new(
            Arc::new(StaticProvider(model)),
            Duration::from_millis(20),
            config(),
        );

        let err = invoker.predict("AAPL", Array3::zeros((1, 4, 5))).await.unwrap_err();
        assert!(matches!(err, AppError::InferenceTimeout(_)));
        assert!(!finished.load(std::sync::atomic::Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(finished.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_wrong_batch_shape_is_rejected_before_loading() {
        let invoker = InferenceInvoker::new(Arc::new(MissingProvider), Duration::from_secs(1), config());
        let err = invoker.predict("AAPL", Array3::zeros((1, 3, 5))).await.unwrap_err();
        assert!(matches!(err, AppError::Schema(_)));
    }
}
