use super::types::{ContextWindow, Message, MessageRole, Session, SessionDigest};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::preference::PreferenceProfile;
use crate::provider::extractive::fold_summary;
use crate::provider::traits::Summarizer;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Everything a session exclusively owns: its history and its preference
/// profile. One lock guards both, so a turn's appends and preference merges
/// can never interleave with another request on the same session.
pub struct SessionEntry {
    pub session: Session,
    pub profile: PreferenceProfile,
}

impl SessionEntry {
    fn new(session: Session) -> Self {
        Self {
            session,
            profile: PreferenceProfile::default(),
        }
    }
}

/// Owns all live sessions.
///
/// The map itself sits behind a short-critical-section `RwLock`; each entry
/// has its own async `Mutex`, the unit of mutual exclusion for everything
/// that mutates one session. Different sessions proceed fully in parallel.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionEntry>>>>,
    config: SessionConfig,
    summarizer: Arc<dyn Summarizer>,
}

impl SessionManager {
    pub fn new(config: SessionConfig, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            summarizer,
        }
    }

    /// Allocate a new empty session and return its id.
    pub fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let entry = Arc::new(Mutex::new(SessionEntry::new(Session::new(id.clone()))));
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), entry);
        tracing::debug!(session = id.as_str(), "session created");
        id
    }

    /// Install a session restored from the durable store.
    ///
    /// Concurrent restores of the same id race to this point; whichever
    /// arrives first wins and later callers get its entry back, so exactly
    /// one lock ever exists per session id.
    pub fn insert_restored(
        &self,
        session: Session,
        profile: PreferenceProfile,
    ) -> Arc<Mutex<SessionEntry>> {
        let id = session.id.clone();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(SessionEntry { session, profile })))
            .clone()
    }

    /// Handle to one session's lock, or `SessionError::NotFound`.
    pub fn entry(&self, session_id: &str) -> Result<Arc<Mutex<SessionEntry>>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()).into())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Append a message, evicting into the summary if the window budget is
    /// exceeded. Standalone entry point; the orchestrator performs the same
    /// steps under an already-held entry lock.
    pub async fn append_message(
        &self,
        session_id: &str,
        role: MessageRole,
        text: &str,
        mode: Option<String>,
    ) -> Result<u64> {
        let entry = self.entry(session_id)?;
        let mut guard = entry.lock().await;
        let message_id = guard.session.push(role, text, mode);
        evict_if_needed(&mut guard.session, &self.config, self.summarizer.as_ref()).await;
        Ok(message_id)
    }

    /// The most recent messages within `budget` plus the current summary.
    pub async fn context_window(&self, session_id: &str, budget: usize) -> Result<ContextWindow> {
        let entry = self.entry(session_id)?;
        let guard = entry.lock().await;
        Ok(guard.session.window(budget))
    }

    /// Read-only digest of one session.
    pub async fn digest(&self, session_id: &str) -> Result<SessionDigest> {
        let entry = self.entry(session_id)?;
        let guard = entry.lock().await;
        let session = &guard.session;
        Ok(SessionDigest {
            session_id: session.id.clone(),
            message_count: session.total_messages(),
            duration_secs: (session.last_activity - session.created_at).num_seconds(),
            last_activity: session.last_activity,
            summary: session.summary.clone(),
        })
    }
}

/// Fold the oldest block of messages into the rolling summary whenever the
/// retained count exceeds the window budget. Returns how many messages were
/// evicted.
///
/// Evicts the overflow plus `evict_batch` slack so the very next append does
/// not immediately re-trigger. Remaining messages keep their exact order. If
/// the external summarizer fails, the deterministic extractive fold is used
/// instead, so the budget invariant holds without dropping content.
pub async fn evict_if_needed(
    session: &mut Session,
    config: &SessionConfig,
    summarizer: &dyn Summarizer,
) -> usize {
    if session.messages.len() <= config.window_budget {
        return 0;
    }

    let overflow = session.messages.len() - config.window_budget;
    let evict_count = overflow
        .max(config.evict_batch)
        .min(session.messages.len());
    let evicted: Vec<Message> = session.messages[..evict_count].to_vec();

    let folded = match summarizer.summarize(&session.summary, &evicted).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!(
                session = session.id.as_str(),
                error = %e,
                "summarizer failed, falling back to extractive fold"
            );
            fold_summary(&session.summary, &evicted)
        }
    };

    // Mutate only after the await: a cancelled caller must never observe
    // messages removed without the summary fold.
    session.messages.drain(..evict_count);
    session.summary = folded;
    session.evicted_count += evict_count;

    tracing::debug!(
        session = session.id.as_str(),
        evicted = evict_count,
        retained = session.messages.len(),
        "messages folded into rolling summary"
    );
    evict_count
}
