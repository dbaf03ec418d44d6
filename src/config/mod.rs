pub mod schema;

pub use schema::{
    Config, FeedbackConfig, IntentConfig, PreferenceConfig, ReliabilityConfig, SessionConfig,
    StorageConfig,
};
