pub mod detector;
pub mod engine;
pub mod types;

pub use detector::{PreferenceDetector, PreferenceTrigger, default_triggers};
pub use engine::PreferenceEngine;
pub use types::{Detection, Preference, PreferenceCategory, PreferenceProfile};
