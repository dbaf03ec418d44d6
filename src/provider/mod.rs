pub mod extractive;
pub mod reliable;
pub mod traits;

pub use extractive::{ExtractiveSummarizer, fold_summary};
pub use reliable::ReliableProvider;
pub use traits::{
    GenerationOutput, GenerationProvider, GenerationRequest, Summarizer, UsageMetadata,
};
