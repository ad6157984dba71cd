pub mod calendar;
pub mod inference_service;
pub mod ingest_service;
pub mod prediction_service;
pub mod reconstruct_service;
pub mod scaler;
pub mod window_service;
