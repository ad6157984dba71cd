mod forecast;
mod price_record;

pub use forecast::{PredictionRequest, PredictionResponse, PredictionResult};
pub use price_record::{feature_matrix, Feature, FeatureVector, RawRow};
