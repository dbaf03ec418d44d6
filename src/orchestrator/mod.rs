use crate::config::{Config, IntentConfig};
use crate::error::{AttuneError, Result};
use crate::feedback::{
    FeedbackAnalytics, FeedbackEngine, FeedbackEvent, FeedbackKind, Reinforcement,
    ReinforcementAction, TimeRange,
};
use crate::intent::{Classification, IntentClassifier};
use crate::preference::{Detection, PreferenceDetector, PreferenceEngine, PreferenceProfile};
use crate::provider::{GenerationProvider, GenerationRequest, Summarizer, UsageMetadata};
use crate::session::manager::{SessionEntry, SessionManager, evict_if_needed};
use crate::session::store::DurableStore;
use crate::session::types::{ContextWindow, MessageRole, SessionDigest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use strum::Display;
use tokio::sync::Mutex;

/// Per-request lifecycle, logged as the request moves through the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RequestPhase {
    Classified,
    ContextAssembled,
    Generating,
    Recorded,
}

/// Provenance attached to every successful response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub provider: String,
    pub latency_ms: u64,
    pub mode: String,
    pub usage: UsageMetadata,
}

/// Result of one completed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub session_id: String,
    pub user_message_id: u64,
    pub response_message_id: u64,
    pub response: String,
    pub mode: String,
    pub score: f64,
    pub meta: ResponseMeta,
}

/// Glue sequencing classifier, session memory, preferences, and feedback
/// around the external generation capability.
///
/// Holds the engines directly and threads session ids explicitly through
/// every call; no behavior is rebound onto live objects at runtime.
pub struct Orchestrator {
    config: Config,
    classifier: IntentClassifier,
    sessions: SessionManager,
    preferences: PreferenceEngine,
    detector: PreferenceDetector,
    feedback: FeedbackEngine,
    provider: Arc<dyn GenerationProvider>,
    summarizer: Arc<dyn Summarizer>,
    store: Option<Arc<dyn DurableStore>>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        provider: Arc<dyn GenerationProvider>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        let classifier = IntentClassifier::new(config.intent.clone());
        let sessions = SessionManager::new(config.session.clone(), Arc::clone(&summarizer));
        let preferences = PreferenceEngine::new(config.preference.clone());
        let feedback = FeedbackEngine::new(config.feedback.clone());
        Self {
            config,
            classifier,
            sessions,
            preferences,
            detector: PreferenceDetector::new(),
            feedback,
            provider,
            summarizer,
            store: None,
        }
    }

    /// Attach a durable store. Without one the core runs in-memory only,
    /// which is a supported configuration.
    pub fn with_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Route, remember, generate, record: the full lifecycle of one inbound
    /// message.
    ///
    /// All mutations for the session happen under its lock, and the
    /// user/assistant pair is appended only after generation succeeds — a
    /// provider failure leaves the session exactly as it was and surfaces as
    /// an error, never as fabricated output or synthetic negative feedback.
    pub async fn submit_message(
        &self,
        session_id: Option<&str>,
        text: &str,
    ) -> Result<SubmitOutcome> {
        let classification = self.classifier.classify(text);
        tracing::debug!(
            mode = classification.mode.as_str(),
            score = classification.score,
            phase = %RequestPhase::Classified,
            "intent classified"
        );

        let (session_id, entry) = self.resolve_session(session_id).await?;
        let mut entry = entry.lock().await;

        let detections = self.detector.detect(text);
        if !detections.is_empty() {
            self.preferences.apply(&mut entry.profile, &detections);
        }
        let request = GenerationRequest {
            mode: classification.mode.clone(),
            context: entry.session.window(self.config.session.window_budget),
            directives: self.preferences.build_directives(&entry.profile),
            input: text.to_string(),
        };
        tracing::debug!(
            session = session_id.as_str(),
            context_messages = request.context.messages.len(),
            directives = request.directives.len(),
            phase = %RequestPhase::ContextAssembled,
            "generation request assembled"
        );

        tracing::debug!(session = session_id.as_str(), phase = %RequestPhase::Generating, "calling provider");
        let started = Instant::now();
        let output = self
            .provider
            .generate(&request)
            .await
            .map_err(AttuneError::Provider)?;
        #[allow(clippy::cast_possible_truncation)]
        let latency_ms = started.elapsed().as_millis() as u64;

        // No await between the two appends: the pair is atomic under
        // cancellation.
        let user_message_id =
            entry
                .session
                .push(MessageRole::User, text, Some(classification.mode.clone()));
        let response_message_id = entry.session.push(
            MessageRole::Assistant,
            &output.text,
            Some(classification.mode.clone()),
        );
        evict_if_needed(&mut entry.session, &self.config.session, self.summarizer.as_ref()).await;

        tracing::info!(
            session = session_id.as_str(),
            mode = classification.mode.as_str(),
            latency_ms,
            phase = %RequestPhase::Recorded,
            "turn recorded"
        );
        self.persist_entry(&entry).await;
        drop(entry);

        let served_by = output
            .served_by
            .clone()
            .unwrap_or_else(|| self.provider.name().to_string());
        Ok(SubmitOutcome {
            session_id,
            user_message_id,
            response_message_id,
            response: output.text,
            mode: classification.mode.clone(),
            score: classification.score,
            meta: ResponseMeta {
                provider: served_by,
                latency_ms,
                mode: classification.mode,
                usage: output.usage,
            },
        })
    }

    /// Record a feedback event and apply any preference reinforcement it
    /// implies.
    ///
    /// Explicit ratings and externally detected implicit signals both come
    /// through here. Stale message or session references do not invalidate
    /// the event; only structurally malformed events are rejected. Returns
    /// the recorded event id.
    pub async fn record_feedback(
        &self,
        session_id: &str,
        message_id: Option<u64>,
        kind: FeedbackKind,
        payload: serde_json::Value,
    ) -> Result<String> {
        let event = FeedbackEvent::new(kind, session_id, message_id, payload);
        let event_id = event.id.clone();
        let reinforcement = self.feedback.record(event.clone())?;

        if let Some(reinforcement) = reinforcement {
            match self.sessions.entry(session_id) {
                Ok(entry) => {
                    let mut entry = entry.lock().await;
                    self.apply_reinforcement(&mut entry.profile, reinforcement);
                    if let Some(store) = &self.store
                        && let Err(e) = store.save_profile(session_id, &entry.profile).await
                    {
                        tracing::warn!(
                            session = session_id,
                            error = %e,
                            "failed to persist profile after reinforcement"
                        );
                    }
                }
                Err(_) => {
                    tracing::debug!(
                        session = session_id,
                        "feedback references unknown session; event retained without reinforcement"
                    );
                }
            }
        }

        if let Some(store) = &self.store
            && let Err(e) = store.append_feedback(&event).await
        {
            tracing::warn!(session = session_id, error = %e, "failed to persist feedback event");
        }

        Ok(event_id)
    }

    fn apply_reinforcement(&self, profile: &mut PreferenceProfile, reinforcement: Reinforcement) {
        let Reinforcement { category, action } = reinforcement;
        match action {
            ReinforcementAction::Reinforce => {
                let active = self
                    .preferences
                    .get_active(profile, category)
                    .map(|pref| pref.value.clone());
                if let Some(value) = active {
                    self.preferences.apply(
                        profile,
                        &[Detection {
                            category,
                            value,
                            confidence: self.preferences.config().reinforce_confidence,
                        }],
                    );
                }
            }
            ReinforcementAction::Decay => self.preferences.decay(profile, category),
            ReinforcementAction::Replace(value) => self.preferences.apply(
                profile,
                &[Detection {
                    category,
                    value,
                    confidence: self.preferences.config().correction_confidence,
                }],
            ),
        }
    }

    /// Allocate a fresh empty session.
    pub fn create_session(&self) -> String {
        self.sessions.create_session()
    }

    /// Classify without submitting; useful for routing previews.
    pub fn classify(&self, text: &str) -> Classification {
        self.classifier.classify(text)
    }

    /// Read-only digest of one session.
    pub async fn session_digest(&self, session_id: &str) -> Result<SessionDigest> {
        self.sessions.digest(session_id).await
    }

    /// The bounded context window currently visible to generation.
    pub async fn context(&self, session_id: &str, budget: usize) -> Result<ContextWindow> {
        self.sessions.context_window(session_id, budget).await
    }

    /// Snapshot of the session's learned preferences.
    pub async fn preferences(&self, session_id: &str) -> Result<PreferenceProfile> {
        let entry = self.sessions.entry(session_id)?;
        let entry = entry.lock().await;
        Ok(entry.profile.clone())
    }

    /// Feedback counts and satisfaction trend for a session.
    pub fn analytics(&self, session_id: &str, range: TimeRange) -> FeedbackAnalytics {
        self.feedback.analytics(session_id, range)
    }

    /// Swap intent patterns/thresholds live; no restart required.
    pub fn update_intent_config(&self, config: IntentConfig) {
        self.classifier.update(config);
    }

    async fn resolve_session(
        &self,
        session_id: Option<&str>,
    ) -> Result<(String, Arc<Mutex<SessionEntry>>)> {
        match session_id {
            None => {
                let id = self.sessions.create_session();
                let entry = self.sessions.entry(&id)?;
                Ok((id, entry))
            }
            Some(id) => match self.sessions.entry(id) {
                Ok(entry) => Ok((id.to_string(), entry)),
                Err(not_found) => {
                    if let Some(store) = &self.store
                        && let Some(session) = store.load_session(id).await?
                    {
                        let profile = store.load_profile(id).await?;
                        tracing::info!(session = id, "session restored from durable store");
                        let entry = self.sessions.insert_restored(session, profile);
                        return Ok((id.to_string(), entry));
                    }
                    Err(not_found)
                }
            },
        }
    }

    /// Best-effort persistence; a store failure degrades durability, never
    /// the turn.
    async fn persist_entry(&self, entry: &SessionEntry) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save_session(&entry.session).await {
            tracing::warn!(
                session = entry.session.id.as_str(),
                error = %e,
                "failed to persist session"
            );
        }
        if let Err(e) = store.save_profile(&entry.session.id, &entry.profile).await {
            tracing::warn!(
                session = entry.session.id.as_str(),
                error = %e,
                "failed to persist profile"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::{ExtractiveSummarizer, GenerationOutput};
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct EchoProvider;
    impl GenerationProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }
        fn generate<'a>(
            &'a self,
            request: &'a GenerationRequest,
        ) -> Pin<Box<dyn Future<Output = std::result::Result<GenerationOutput, ProviderError>> + Send + 'a>>
        {
            Box::pin(async move { Ok(GenerationOutput::text_only(format!("echo: {}", request.input))) })
        }
    }

    struct FailingProvider {
        called: AtomicBool,
    }
    impl GenerationProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }
        fn generate<'a>(
            &'a self,
            _request: &'a GenerationRequest,
        ) -> Pin<Box<dyn Future<Output = std::result::Result<GenerationOutput, ProviderError>> + Send + 'a>>
        {
            Box::pin(async move {
                self.called.store(true, Ordering::SeqCst);
                Err(ProviderError::Unavailable {
                    provider: "failing".into(),
                    message: "down".into(),
                })
            })
        }
    }

    fn orchestrator(provider: Arc<dyn GenerationProvider>) -> Orchestrator {
        Orchestrator::new(Config::default(), provider, Arc::new(ExtractiveSummarizer))
    }

    #[tokio::test]
    async fn submit_without_session_creates_one_and_appends_pair() {
        let orch = orchestrator(Arc::new(EchoProvider));
        let outcome = orch.submit_message(None, "hello there").await.unwrap();

        assert_eq!(outcome.response, "echo: hello there");
        assert_eq!(outcome.meta.provider, "echo");
        assert!(outcome.response_message_id > outcome.user_message_id);

        let digest = orch.session_digest(&outcome.session_id).await.unwrap();
        assert_eq!(digest.message_count, 2);
    }

    #[tokio::test]
    async fn submit_to_unknown_session_without_store_fails() {
        let orch = orchestrator(Arc::new(EchoProvider));
        let err = orch.submit_message(Some("missing"), "hello").await.unwrap_err();
        assert!(err.to_string().contains("session not found"));
    }

    #[tokio::test]
    async fn provider_failure_leaves_session_untouched_and_records_no_feedback() {
        let provider = Arc::new(FailingProvider {
            called: AtomicBool::new(false),
        });
        let orch = orchestrator(provider.clone());
        let session_id = orch.create_session();

        let err = orch
            .submit_message(Some(&session_id), "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, AttuneError::Provider(_)));
        assert!(provider.called.load(Ordering::SeqCst));

        // Nothing appended, nothing auto-recorded as dissatisfaction.
        let digest = orch.session_digest(&session_id).await.unwrap();
        assert_eq!(digest.message_count, 0);
        assert_eq!(orch.analytics(&session_id, TimeRange::all()).total, 0);
    }

    #[tokio::test]
    async fn stated_preference_shows_up_in_next_request_directives() {
        struct CapturingProvider {
            directives: std::sync::Mutex<Vec<Vec<String>>>,
        }
        impl GenerationProvider for CapturingProvider {
            fn name(&self) -> &str {
                "capturing"
            }
            fn generate<'a>(
                &'a self,
                request: &'a GenerationRequest,
            ) -> Pin<
                Box<
                    dyn Future<Output = std::result::Result<GenerationOutput, ProviderError>>
                        + Send
                        + 'a,
                >,
            > {
                Box::pin(async move {
                    self.directives
                        .lock()
                        .unwrap()
                        .push(request.directives.clone());
                    Ok(GenerationOutput::text_only("ok"))
                })
            }
        }

        let provider = Arc::new(CapturingProvider {
            directives: std::sync::Mutex::new(Vec::new()),
        });
        let orch = Orchestrator::new(
            Config::default(),
            provider.clone(),
            Arc::new(ExtractiveSummarizer),
        );

        let outcome = orch
            .submit_message(None, "please be concise and keep it short")
            .await
            .unwrap();
        orch.submit_message(Some(&outcome.session_id), "tell me about rust")
            .await
            .unwrap();

        let captured = provider.directives.lock().unwrap();
        // The stated preference clears the reporting threshold, so the
        // second request carries the directive.
        assert!(
            captured[1]
                .iter()
                .any(|d| d.contains("concise"))
        );
    }

    #[tokio::test]
    async fn positive_feedback_reinforces_active_preference() {
        let orch = orchestrator(Arc::new(EchoProvider));
        let outcome = orch
            .submit_message(None, "be concise and keep it short please")
            .await
            .unwrap();
        let before = orch
            .preferences(&outcome.session_id)
            .await
            .unwrap()
            .get(crate::preference::PreferenceCategory::Verbosity)
            .unwrap()
            .confidence;

        orch.record_feedback(
            &outcome.session_id,
            Some(outcome.response_message_id),
            FeedbackKind::ExplicitPositive,
            json!({"category": "verbosity"}),
        )
        .await
        .unwrap();

        let after = orch
            .preferences(&outcome.session_id)
            .await
            .unwrap()
            .get(crate::preference::PreferenceCategory::Verbosity)
            .unwrap()
            .confidence;
        assert!(after > before);
    }

    #[tokio::test]
    async fn correction_feedback_replaces_preference_value() {
        let orch = orchestrator(Arc::new(EchoProvider));
        let session_id = orch.create_session();

        orch.record_feedback(
            &session_id,
            None,
            FeedbackKind::ExplicitCorrection,
            json!({"category": "tone", "value": "formal"}),
        )
        .await
        .unwrap();

        let profile = orch.preferences(&session_id).await.unwrap();
        let pref = profile
            .get(crate::preference::PreferenceCategory::Tone)
            .unwrap();
        assert_eq!(pref.value, "formal");
    }

    #[tokio::test]
    async fn feedback_for_unknown_session_is_retained_without_reinforcement() {
        let orch = orchestrator(Arc::new(EchoProvider));
        orch.record_feedback(
            "ghost-session",
            Some(42),
            FeedbackKind::ExplicitPositive,
            json!({"category": "tone"}),
        )
        .await
        .unwrap();

        assert_eq!(orch.analytics("ghost-session", TimeRange::all()).total, 1);
    }

    #[tokio::test]
    async fn live_intent_update_changes_mode_selection() {
        let orch = orchestrator(Arc::new(EchoProvider));
        let mut config = IntentConfig::default();
        config.patterns.clear();
        orch.update_intent_config(config);

        let outcome = orch.submit_message(None, "fix the bug").await.unwrap();
        assert_eq!(outcome.mode, "general");
    }
}
