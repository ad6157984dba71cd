use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::external::lstm_model::LstmModel;
use crate::external::model_provider::{
    artifact_name, ForecastModel, ModelProvider, ModelProviderError,
};

/// Loads `<ID>.json` artifacts from a local directory.
pub struct FsModelProvider {
    dir: PathBuf,
}

impl FsModelProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ModelProvider for FsModelProvider {
    async fn load(&self, model_id: &str) -> Result<Arc<dyn ForecastModel>, ModelProviderError> {
        let path = self.dir.join(artifact_name(model_id));
        debug!("Reading model artifact {:?}", path);

        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ModelProviderError::NotFound(path.display().to_string()),
            _ => ModelProviderError::Io(format!("{}: {}", path.display(), e)),
        })?;

        let model = LstmModel::from_json(&bytes)?;
        info!("Loaded model {} from {:?}", model_id, path);
        Ok(Arc::new(model))
    }
}
