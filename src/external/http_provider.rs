use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{info, warn};
use url::Url;

use crate::external::lstm_model::LstmModel;
use crate::external::model_provider::{
    artifact_name, ForecastModel, ModelProvider, ModelProviderError,
};

/// Downloads `<ID>.json` artifacts from object storage over HTTP(S).
pub struct HttpModelProvider {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpModelProvider {
    pub fn new(base_url: &str) -> Result<Self, ModelProviderError> {
        // a trailing slash makes Url::join append instead of replacing the last segment
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| ModelProviderError::Network(format!("invalid base url: {}", e)))?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn artifact_url(&self, model_id: &str) -> Result<Url, ModelProviderError> {
        self.base_url
            .join(&artifact_name(model_id))
            .map_err(|e| ModelProviderError::Network(e.to_string()))
    }
}

#[async_trait]
impl ModelProvider for HttpModelProvider {
    async fn load(&self, model_id: &str) -> Result<Arc<dyn ForecastModel>, ModelProviderError> {
        let url = self.artifact_url(model_id)?;

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ModelProviderError::Network(e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => return Err(ModelProviderError::NotFound(url.to_string())),
            status if !status.is_success() => {
                warn!("Model download for {} returned {}", model_id, status);
                return Err(ModelProviderError::Network(format!(
                    "{} returned {}",
                    url, status
                )));
            }
            _ => {}
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ModelProviderError::Network(e.to_string()))?;

        let model = LstmModel::from_json(&bytes)?;
        info!("Downloaded model {} from {}", model_id, url);
        Ok(Arc::new(model))
    }
}
