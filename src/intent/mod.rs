pub mod classifier;
pub mod patterns;

pub use classifier::{Classification, IntentClassifier};
pub use patterns::{IntentPattern, default_patterns};
