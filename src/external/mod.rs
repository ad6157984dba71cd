pub mod fs_provider;
pub mod http_provider;
pub mod lstm_model;
pub mod model_provider;
