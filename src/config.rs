use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;
use crate::models::Feature;
use crate::services::scaler::ConstantChannelPolicy;

/// Timesteps per model input window.
pub const DEFAULT_WINDOW_LENGTH: usize = 60;
pub const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 30;

/// Shape contract between the pipeline and the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub window_length: usize,
    pub feature_count: usize,
    pub constant_channels: ConstantChannelPolicy,
}

impl PipelineConfig {
    pub fn new(window_length: usize, feature_count: usize) -> Result<Self, AppError> {
        if window_length == 0 {
            return Err(AppError::Validation(
                "window length must be at least 1".to_string(),
            ));
        }
        if feature_count != Feature::COUNT {
            return Err(AppError::Validation(format!(
                "model expects {} features but the pipeline produces {}",
                feature_count,
                Feature::COUNT
            )));
        }

        Ok(Self {
            window_length,
            feature_count,
            constant_channels: ConstantChannelPolicy::Reject,
        })
    }

    pub fn with_constant_channels(mut self, policy: ConstantChannelPolicy) -> Self {
        self.constant_channels = policy;
        self
    }

    /// Rows needed to form one window plus its following target.
    pub fn min_rows(&self) -> usize {
        self.window_length + 1
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_length: DEFAULT_WINDOW_LENGTH,
            feature_count: Feature::COUNT,
            constant_channels: ConstantChannelPolicy::Reject,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    Directory(PathBuf),
    Remote(String),
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub model_source: ModelSource,
    pub inference_timeout: Duration,
    pub pipeline: PipelineConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let bind_addr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Validation(format!("invalid BIND_ADDR: {}", e)))?;

        let provider = std::env::var("MODEL_PROVIDER").unwrap_or_else(|_| "fs".to_string());
        let model_source = match provider.to_lowercase().as_str() {
            "fs" => ModelSource::Directory(PathBuf::from(
                std::env::var("MODEL_DIR").unwrap_or_else(|_| "models".to_string()),
            )),
            "http" => ModelSource::Remote(std::env::var("MODEL_BASE_URL").map_err(|_| {
                AppError::Validation("MODEL_PROVIDER=http requires MODEL_BASE_URL".to_string())
            })?),
            other => {
                return Err(AppError::Validation(format!(
                    "Invalid MODEL_PROVIDER: {}. Must be 'fs' or 'http'",
                    other
                )))
            }
        };

        let timeout_secs = parse_env_or("INFERENCE_TIMEOUT_SECS", DEFAULT_INFERENCE_TIMEOUT_SECS)?;
        let window_length = parse_env_or("WINDOW_LENGTH", DEFAULT_WINDOW_LENGTH)?;

        let constant_channels = match std::env::var("SCALER_CONSTANT_CHANNELS") {
            Ok(value) => value.parse::<ConstantChannelPolicy>()?,
            Err(_) => ConstantChannelPolicy::Reject,
        };

        let config = Self {
            bind_addr,
            model_source,
            inference_timeout: Duration::from_secs(timeout_secs),
            pipeline: PipelineConfig::new(window_length, Feature::COUNT)?
                .with_constant_channels(constant_channels),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.inference_timeout.is_zero() {
            return Err(AppError::Validation(
                "INFERENCE_TIMEOUT_SECS must be positive".to_string(),
            ));
        }
        if let ModelSource::Remote(base) = &self.model_source {
            url::Url::parse(base)
                .map_err(|e| AppError::Validation(format!("invalid MODEL_BASE_URL: {}", e)))?;
        }
        Ok(())
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::Validation(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.window_length, 60);
        assert_eq!(config.feature_count, 5);
        assert_eq!(config.min_rows(), 61);
        assert_eq!(config.constant_channels, ConstantChannelPolicy::Reject);
    }

    #[test]
    fn test_pipeline_config_rejects_wrong_feature_count() {
        assert!(PipelineConfig::new(60, 4).is_err());
        assert!(PipelineConfig::new(60, 6).is_err());
        assert!(PipelineConfig::new(0, 5).is_err());
        assert!(PipelineConfig::new(30, 5).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_remote_url() {
        let config = ServiceConfig {
            bind_addr: "127.0.0.1:8000".parse().unwrap(),
            model_source: ModelSource::Remote("not a url".to_string()),
            inference_timeout: Duration::from_secs(5),
            pipeline: PipelineConfig::default(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ServiceConfig {
            bind_addr: "127.0.0.1:8000".parse().unwrap(),
            model_source: ModelSource::Directory(PathBuf::from("models")),
            inference_timeout: Duration::ZERO,
            pipeline: PipelineConfig::default(),
        };
        assert!(config.validate().is_err());
    }
}
