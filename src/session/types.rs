use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One immutable conversation message.
///
/// Ids are monotonically increasing within their session, so ordering is a
/// property of the data, not of storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub session_id: String,
    pub role: MessageRole,
    pub text: String,
    /// Operating mode selected for the turn this message belongs to.
    pub mode: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One conversation: retained messages plus a rolling summary of everything
/// evicted. Retained + summary never lose information present at eviction
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub summary: String,
    /// Messages folded into the summary so far.
    pub evicted_count: usize,
    pub last_activity: DateTime<Utc>,
    pub(crate) next_message_id: u64,
}

impl Session {
    pub fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            messages: Vec::new(),
            summary: String::new(),
            evicted_count: 0,
            last_activity: now,
            next_message_id: 1,
        }
    }

    /// Append a message, allocating the next id in the session's sequence.
    pub fn push(&mut self, role: MessageRole, text: &str, mode: Option<String>) -> u64 {
        let id = self.next_message_id;
        self.next_message_id += 1;
        let now = Utc::now();
        self.messages.push(Message {
            id,
            session_id: self.id.clone(),
            role,
            text: text.to_string(),
            mode,
            created_at: now,
        });
        self.last_activity = now;
        id
    }

    /// Retained + evicted.
    pub fn total_messages(&self) -> usize {
        self.messages.len() + self.evicted_count
    }

    /// The most recent `budget` messages plus the current summary. Never
    /// exceeds the budget; ordering matches append order.
    pub fn window(&self, budget: usize) -> ContextWindow {
        let start = self.messages.len().saturating_sub(budget);
        ContextWindow {
            summary: self.summary.clone(),
            messages: self.messages[start..].to_vec(),
        }
    }
}

/// The bounded message slice (plus summary) handed to the generation
/// capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextWindow {
    pub summary: String,
    pub messages: Vec<Message>,
}

impl ContextWindow {
    /// Render as a plain transcript, summary block first.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.summary.is_empty() {
            out.push_str(&self.summary);
            out.push('\n');
        }
        for message in &self.messages {
            let label = match message.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
            };
            out.push_str(&format!("{label}: {}\n", message.text));
        }
        out
    }
}

/// Read-only digest of one session, exposed to the surrounding system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDigest {
    pub session_id: String,
    /// Retained plus evicted messages.
    pub message_count: usize,
    pub duration_secs: i64,
    pub last_activity: DateTime<Utc>,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_allocates_monotonic_ids() {
        let mut session = Session::new("s1".into());
        let first = session.push(MessageRole::User, "hello", None);
        let second = session.push(MessageRole::Assistant, "hi", None);
        assert!(second > first);
        assert_eq!(session.messages.len(), 2);
    }

    #[test]
    fn window_returns_most_recent_within_budget() {
        let mut session = Session::new("s1".into());
        for index in 0..6 {
            session.push(MessageRole::User, &format!("m{index}"), None);
        }

        let window = session.window(3);
        assert_eq!(window.messages.len(), 3);
        assert_eq!(window.messages[0].text, "m3");
        assert_eq!(window.messages[2].text, "m5");
    }

    #[test]
    fn window_handles_budget_larger_than_history() {
        let mut session = Session::new("s1".into());
        session.push(MessageRole::User, "only", None);
        let window = session.window(10);
        assert_eq!(window.messages.len(), 1);
    }

    #[test]
    fn render_prefixes_summary_and_labels_roles() {
        let mut session = Session::new("s1".into());
        session.summary = "[summary]".into();
        session.push(MessageRole::User, "question", None);
        session.push(MessageRole::Assistant, "answer", None);

        let rendered = session.window(10).render();
        assert!(rendered.starts_with("[summary]\n"));
        assert!(rendered.contains("User: question"));
        assert!(rendered.contains("Assistant: answer"));
    }
}
