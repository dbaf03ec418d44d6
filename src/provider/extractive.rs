use super::traits::Summarizer;
use crate::session::types::{Message, MessageRole};
use std::future::Future;
use std::pin::Pin;

const LINE_BUDGET: usize = 200;

fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}…")
}

/// Fold evicted messages into the rolling summary as role-labelled,
/// truncated lines. Deterministic, lossy in wording but not in coverage:
/// every evicted message contributes a line.
pub fn fold_summary(existing_summary: &str, evicted: &[Message]) -> String {
    let mut lines = Vec::with_capacity(evicted.len());
    for message in evicted {
        let label = match message.role {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
        };
        lines.push(format!(
            "{label}: {}",
            truncate_with_ellipsis(&message.text, LINE_BUDGET)
        ));
    }

    if existing_summary.is_empty() {
        format!("[conversation summary]\n{}", lines.join("\n"))
    } else {
        format!("{existing_summary}\n{}", lines.join("\n"))
    }
}

/// Built-in summarizer. Used standalone when no model-backed summarizer is
/// configured, and as the fallback when the external capability fails, so
/// eviction can always uphold the window budget without dropping content.
pub struct ExtractiveSummarizer;

impl Summarizer for ExtractiveSummarizer {
    fn summarize<'a>(
        &'a self,
        existing_summary: &'a str,
        evicted: &'a [Message],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move { Ok(fold_summary(existing_summary, evicted)) })
    }
}
