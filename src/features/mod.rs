//! Input normalization, encoding and scaling
//!
//! Turns loose user JSON into the exact scaled feature vector a bundle
//! expects: [`normalize`] reconciles field names and fills defaults,
//! [`FeatureEncoder`] one-hot encodes against the training-time levels, and
//! [`StandardScaler`] standardizes.

pub mod encoder;
pub mod normalizer;
pub mod scaler;
pub mod schema;
#[cfg(test)]
mod tests;

pub use encoder::FeatureEncoder;
pub use normalizer::{normalize, NormalizedRecord};
pub use scaler::StandardScaler;
pub use schema::{gastric_default, FieldKind, FieldSpec, Schema, GASTRIC_KEY_FIELDS, HEART_FIELDS};
