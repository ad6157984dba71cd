use std::sync::Arc;

use crate::services::prediction_service::ForecastPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ForecastPipeline>,
}
