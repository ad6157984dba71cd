use std::sync::Arc;
use std::time::Duration;

use ndarray::Array3;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::errors::AppError;
use crate::external::model_provider::ModelProvider;
use crate::models::{feature_matrix, PredictionResult, RawRow};
use crate::services::inference_service::InferenceInvoker;
use crate::services::ingest_service;
use crate::services::reconstruct_service::reconstruct_close_prices;
use crate::services::scaler::ScalerState;
use crate::services::window_service::FeatureWindower;

const MAX_STOCK_NAME_LEN: usize = 16;

/// Model-ready input for one request, before inference.
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub rows: Vec<RawRow>,
    pub scaler: ScalerState,
    /// Normalized `(1, window_length, 5)` forecast window.
    pub inputs: Array3<f64>,
}

/// Ingest → window → scale → infer → reconstruct.
///
/// Shared between requests; holds no per-request state. Each call fits and
/// owns its own [`ScalerState`].
pub struct ForecastPipeline {
    config: PipelineConfig,
    windower: FeatureWindower,
    invoker: InferenceInvoker,
}

impl ForecastPipeline {
    pub fn new(config: PipelineConfig, provider: Arc<dyn ModelProvider>, timeout: Duration) -> Self {
        Self {
            config,
            windower: FeatureWindower::new(&config),
            invoker: InferenceInvoker::new(provider, timeout, config),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Parse, window and normalize an upload. Never touches the model.
    pub fn prepare(&self, raw: &str) -> Result<PreparedInput, AppError> {
        let rows = ingest_service::parse_price_table(raw)?;
        self.windower.ensure_sufficient(rows.len())?;

        let matrix = feature_matrix(&rows);
        let window = self.windower.forecast_batch(&matrix)?;

        // fit spans every supplied row, not only the forecast window
        let scaler = ScalerState::fit(&matrix, self.config.constant_channels)?;
        let inputs = scaler.transform_batch(&window.inputs)?;
        debug!(
            "Prepared {} rows into window batch {:?}",
            rows.len(),
            inputs.dim()
        );

        Ok(PreparedInput {
            rows,
            scaler,
            inputs,
        })
    }

    pub async fn forecast(&self, stock_name: &str, raw: &str) -> Result<PredictionResult, AppError> {
        let model_id = validate_stock_name(stock_name)?;
        let PreparedInput {
            rows,
            scaler,
            inputs,
        } = self.prepare(raw)?;

        let predictions = self.invoker.predict(&model_id, inputs).await?;
        let close_prices = reconstruct_close_prices(&predictions, &scaler)?;

        let last_observed = rows
            .last()
            .map(|row| row.date)
            .ok_or_else(|| AppError::Schema("no rows".to_string()))?;

        info!(
            "Forecast for {}: {} rows in, {} prices out",
            model_id,
            rows.len(),
            close_prices.len()
        );

        Ok(PredictionResult {
            close_prices,
            last_observed,
            rows_ingested: rows.len(),
        })
    }
}

/// Upper-cases a ticker after checking it is safe to use as an artifact name.
pub fn validate_stock_name(stock_name: &str) -> Result<String, AppError> {
    let name = stock_name.trim();
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    let starts_alnum = name.chars().next().map_or(false, |c| c.is_ascii_alphanumeric());

    if name.is_empty() || name.len() > MAX_STOCK_NAME_LEN || !valid_chars || !starts_alnum {
        return Err(AppError::Validation(format!(
            "invalid stock name '{}': use 1-{} letters, digits, '.' or '-'",
            stock_name, MAX_STOCK_NAME_LEN
        )));
    }
    Ok(name.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_stock_name() {
        assert_eq!(validate_stock_name(" aapl ").unwrap(), "AAPL");
        assert_eq!(validate_stock_name("BRK.B").unwrap(), "BRK.B");
        assert!(validate_stock_name("").is_err());
        assert!(validate_stock_name("../etc").is_err());
        assert!(validate_stock_name("a/b").is_err());
        assert!(validate_stock_name("ABCDEFGHIJKLMNOPQ").is_err());
    }
}
