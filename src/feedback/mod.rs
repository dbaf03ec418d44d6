pub mod engine;
pub mod types;

pub use engine::{FeedbackEngine, Reinforcement, ReinforcementAction};
pub use types::{FeedbackAnalytics, FeedbackEvent, FeedbackKind, TimeRange, Trend};
