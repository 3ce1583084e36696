//! `kilnwatch-features`
//!
//! Turns ordered sample sequences into named feature columns: rolling
//! statistics, rates of change, declared cross products, and time-derived
//! features. Pure and stateless; the same input always yields the same frame.

pub mod engine;
pub mod frame;
pub mod rolling;

pub use engine::{CrossFeature, FeatureEngine, TimeFeatures, sanitize};
pub use frame::FeatureFrame;
pub use rolling::DEVIATION_EPSILON;
