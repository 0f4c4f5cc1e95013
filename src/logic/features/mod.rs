//! Features Module - Feature Extraction Engine
//!
//! Turns a meter's raw reading sequence into the fixed 9-value
//! `FeatureVector`. One file per feature family, combined in `extractor`.

pub mod layout;
pub mod vector;
pub mod reading;
pub mod stats;
pub mod consumption;
pub mod daily;
pub mod window;
pub mod extractor;


// Re-export common types
pub use layout::{FEATURE_COUNT, FEATURE_LAYOUT};
pub use vector::{FeatureVector, FeatureVectorBuilder, FeatureExtractor};
pub use reading::{Reading, MeterReadings};
pub use extractor::{
    extract_features, extract_features_batch, features_to_array, batch_to_array, MeterFeatures,
};
