use super::types::{Message, MessageRole, Session};
use crate::feedback::types::{FeedbackEvent, FeedbackKind};
use crate::preference::types::{Preference, PreferenceCategory, PreferenceProfile};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

/// Optional durable persistence for sessions, profiles, and the feedback
/// log. When no store is configured the core runs in-memory only, which is
/// an explicit, non-fatal configuration state.
pub trait DurableStore: Send + Sync {
    fn save_session<'a>(
        &'a self,
        session: &'a Session,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    fn load_session<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Session>>> + Send + 'a>>;

    fn save_profile<'a>(
        &'a self,
        session_id: &'a str,
        profile: &'a PreferenceProfile,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    fn load_profile<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<PreferenceProfile>> + Send + 'a>>;

    fn append_feedback<'a>(
        &'a self,
        event: &'a FeedbackEvent,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    fn load_feedback<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FeedbackEvent>>> + Send + 'a>>;
}

/// SQLite-backed store using a sqlx async pool.
pub struct SqliteStore {
    pool: SqlitePool,
}

const SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS attune_schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const SCHEMA_VERSION_KEY: &str = "attune_schema_version";
const SCHEMA_VERSION: u32 = 1;

async fn ensure_schema_version(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_META_TABLE)
        .execute(pool)
        .await
        .context("create attune_schema_meta table")?;

    let stored_version: Option<(String,)> =
        sqlx::query_as("SELECT value FROM attune_schema_meta WHERE key = $1")
            .bind(SCHEMA_VERSION_KEY)
            .fetch_optional(pool)
            .await
            .context("load schema version")?;

    if let Some((value,)) = stored_version {
        let parsed = value
            .parse::<u32>()
            .with_context(|| format!("invalid schema version value: {value}"))?;
        anyhow::ensure!(
            parsed == SCHEMA_VERSION,
            "incompatible store schema version: stored={parsed}, expected={SCHEMA_VERSION}. \
remove the store DB and restart."
        );
        return Ok(());
    }

    sqlx::query("INSERT INTO attune_schema_meta (key, value) VALUES ($1, $2)")
        .bind(SCHEMA_VERSION_KEY)
        .bind(SCHEMA_VERSION.to_string())
        .execute(pool)
        .await
        .context("persist schema version")?;

    Ok(())
}

impl SqliteStore {
    /// Create a new store with an existing pool and run migrations.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await?;

        ensure_schema_version(&pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                 id TEXT PRIMARY KEY,
                 created_at TEXT NOT NULL,
                 last_activity TEXT NOT NULL,
                 summary TEXT NOT NULL DEFAULT '',
                 evicted_count INTEGER NOT NULL DEFAULT 0,
                 next_message_id INTEGER NOT NULL DEFAULT 1
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                 session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                 id INTEGER NOT NULL,
                 role TEXT NOT NULL,
                 text TEXT NOT NULL,
                 mode TEXT,
                 created_at TEXT NOT NULL,
                 PRIMARY KEY (session_id, id)
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS preferences (
                 session_id TEXT NOT NULL,
                 category TEXT NOT NULL,
                 value TEXT NOT NULL,
                 confidence REAL NOT NULL,
                 evidence_count INTEGER NOT NULL,
                 last_updated TEXT NOT NULL,
                 PRIMARY KEY (session_id, category)
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS feedback_events (
                 id TEXT PRIMARY KEY,
                 session_id TEXT NOT NULL,
                 message_id INTEGER,
                 kind TEXT NOT NULL,
                 payload TEXT NOT NULL,
                 created_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_feedback_session
                 ON feedback_events(session_id, created_at)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Open (or create) a store at the given file path.
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("open sqlite store at {}", path.display()))?;
        Self::new(pool).await
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid stored timestamp: {raw}"))?
        .with_timezone(&Utc))
}

fn role_to_str(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

fn str_to_role(value: &str) -> Result<MessageRole> {
    match value {
        "user" => Ok(MessageRole::User),
        "assistant" => Ok(MessageRole::Assistant),
        _ => anyhow::bail!("unknown message role: {value}"),
    }
}

fn map_message_row(row: &SqliteRow) -> Result<Message> {
    let role_raw: String = row.try_get("role")?;
    let id: i64 = row.try_get("id")?;
    let created_at_raw: String = row.try_get("created_at")?;

    Ok(Message {
        #[allow(clippy::cast_sign_loss)]
        id: id as u64,
        session_id: row.try_get("session_id")?,
        role: str_to_role(&role_raw)?,
        text: row.try_get("text")?,
        mode: row.try_get("mode")?,
        created_at: parse_timestamp(&created_at_raw)?,
    })
}

fn map_feedback_row(row: &SqliteRow) -> Result<FeedbackEvent> {
    let kind_raw: String = row.try_get("kind")?;
    let payload_raw: String = row.try_get("payload")?;
    let message_id: Option<i64> = row.try_get("message_id")?;
    let created_at_raw: String = row.try_get("created_at")?;

    Ok(FeedbackEvent {
        id: row.try_get("id")?,
        kind: kind_raw
            .parse::<FeedbackKind>()
            .map_err(|_| anyhow::anyhow!("unknown feedback kind: {kind_raw}"))?,
        session_id: row.try_get("session_id")?,
        #[allow(clippy::cast_sign_loss)]
        message_id: message_id.map(|v| v as u64),
        payload: serde_json::from_str(&payload_raw).context("deserialize feedback payload")?,
        created_at: parse_timestamp(&created_at_raw)?,
    })
}

impl DurableStore for SqliteStore {
    fn save_session<'a>(
        &'a self,
        session: &'a Session,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.context("begin session save")?;

            #[allow(clippy::cast_possible_wrap)]
            let evicted_count = session.evicted_count as i64;
            #[allow(clippy::cast_possible_wrap)]
            let next_message_id = session.next_message_id as i64;

            sqlx::query(
                "INSERT OR REPLACE INTO sessions
                     (id, created_at, last_activity, summary, evicted_count, next_message_id)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&session.id)
            .bind(session.created_at.to_rfc3339())
            .bind(session.last_activity.to_rfc3339())
            .bind(&session.summary)
            .bind(evicted_count)
            .bind(next_message_id)
            .execute(&mut *tx)
            .await?;

            // Snapshot semantics: evicted messages live on in the summary.
            sqlx::query("DELETE FROM messages WHERE session_id = $1")
                .bind(&session.id)
                .execute(&mut *tx)
                .await?;

            for message in &session.messages {
                #[allow(clippy::cast_possible_wrap)]
                let message_id = message.id as i64;
                sqlx::query(
                    "INSERT INTO messages (session_id, id, role, text, mode, created_at)
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(&message.session_id)
                .bind(message_id)
                .bind(role_to_str(message.role))
                .bind(&message.text)
                .bind(&message.mode)
                .bind(message.created_at.to_rfc3339())
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await.context("commit session save")
        })
    }

    fn load_session<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Session>>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, created_at, last_activity, summary, evicted_count, next_message_id
                 FROM sessions
                 WHERE id = $1",
            )
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .context("query session by id")?;

            let Some(row) = row else {
                return Ok(None);
            };

            let created_at_raw: String = row.try_get("created_at")?;
            let last_activity_raw: String = row.try_get("last_activity")?;
            let evicted_count: i64 = row.try_get("evicted_count")?;
            let next_message_id: i64 = row.try_get("next_message_id")?;

            let message_rows = sqlx::query(
                "SELECT session_id, id, role, text, mode, created_at
                 FROM messages
                 WHERE session_id = $1
                 ORDER BY id ASC",
            )
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

            let messages = message_rows
                .iter()
                .map(map_message_row)
                .collect::<Result<Vec<_>>>()?;

            Ok(Some(Session {
                id: row.try_get("id")?,
                created_at: parse_timestamp(&created_at_raw)?,
                messages,
                summary: row.try_get("summary")?,
                evicted_count: usize::try_from(evicted_count)
                    .context("convert evicted count to usize")?,
                last_activity: parse_timestamp(&last_activity_raw)?,
                #[allow(clippy::cast_sign_loss)]
                next_message_id: next_message_id as u64,
            }))
        })
    }

    fn save_profile<'a>(
        &'a self,
        session_id: &'a str,
        profile: &'a PreferenceProfile,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.context("begin profile save")?;

            sqlx::query("DELETE FROM preferences WHERE session_id = $1")
                .bind(session_id)
                .execute(&mut *tx)
                .await?;

            for (category, preference) in profile.iter() {
                sqlx::query(
                    "INSERT INTO preferences
                         (session_id, category, value, confidence, evidence_count, last_updated)
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(session_id)
                .bind(category.to_string())
                .bind(&preference.value)
                .bind(preference.confidence)
                .bind(i64::from(preference.evidence_count))
                .bind(preference.last_updated.to_rfc3339())
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await.context("commit profile save")
        })
    }

    fn load_profile<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<PreferenceProfile>> + Send + 'a>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT category, value, confidence, evidence_count, last_updated
                 FROM preferences
                 WHERE session_id = $1",
            )
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

            let mut profile = PreferenceProfile::default();
            for row in &rows {
                let category_raw: String = row.try_get("category")?;
                let category = category_raw
                    .parse::<PreferenceCategory>()
                    .map_err(|_| anyhow::anyhow!("unknown preference category: {category_raw}"))?;
                let evidence_count: i64 = row.try_get("evidence_count")?;
                let last_updated_raw: String = row.try_get("last_updated")?;

                profile.insert(
                    category,
                    Preference {
                        value: row.try_get("value")?,
                        confidence: row.try_get("confidence")?,
                        evidence_count: u32::try_from(evidence_count)
                            .context("convert evidence count to u32")?,
                        last_updated: parse_timestamp(&last_updated_raw)?,
                    },
                );
            }

            Ok(profile)
        })
    }

    fn append_feedback<'a>(
        &'a self,
        event: &'a FeedbackEvent,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            #[allow(clippy::cast_possible_wrap)]
            let message_id = event.message_id.map(|v| v as i64);
            sqlx::query(
                "INSERT INTO feedback_events (id, session_id, message_id, kind, payload, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&event.id)
            .bind(&event.session_id)
            .bind(message_id)
            .bind(event.kind.to_string())
            .bind(serde_json::to_string(&event.payload)?)
            .bind(event.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn load_feedback<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FeedbackEvent>>> + Send + 'a>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT id, session_id, message_id, kind, payload, created_at
                 FROM feedback_events
                 WHERE session_id = $1
                 ORDER BY created_at ASC",
            )
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

            rows.iter().map(map_feedback_row).collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::MessageRole;
    use serde_json::json;

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteStore::new(pool).await.unwrap()
    }

    #[tokio::test]
    async fn session_roundtrips_with_messages_and_summary() {
        let store = store().await;
        let mut session = Session::new("s1".into());
        session.push(MessageRole::User, "hello", Some("general".into()));
        session.push(MessageRole::Assistant, "hi there", Some("general".into()));
        session.summary = "[conversation summary]\nUser: earlier".into();
        session.evicted_count = 1;

        store.save_session(&session).await.unwrap();
        let loaded = store.load_session("s1").await.unwrap().unwrap();

        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.messages[0].text, "hello");
        assert_eq!(loaded.messages[1].role, MessageRole::Assistant);
        assert_eq!(loaded.summary, session.summary);
        assert_eq!(loaded.evicted_count, 1);
        assert_eq!(loaded.next_message_id, session.next_message_id);
    }

    #[tokio::test]
    async fn load_missing_session_returns_none() {
        let store = store().await;
        assert!(store.load_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_session_replaces_previous_snapshot() {
        let store = store().await;
        let mut session = Session::new("s1".into());
        session.push(MessageRole::User, "first", None);
        store.save_session(&session).await.unwrap();

        // Simulate eviction: message dropped from retained set.
        session.messages.clear();
        session.evicted_count = 1;
        session.summary = "[conversation summary]\nUser: first".into();
        store.save_session(&session).await.unwrap();

        let loaded = store.load_session("s1").await.unwrap().unwrap();
        assert!(loaded.messages.is_empty());
        assert_eq!(loaded.evicted_count, 1);
    }

    #[tokio::test]
    async fn profile_roundtrips() {
        let store = store().await;
        let mut session = Session::new("s1".into());
        session.push(MessageRole::User, "x", None);
        store.save_session(&session).await.unwrap();

        let mut profile = PreferenceProfile::default();
        profile.insert(
            PreferenceCategory::Verbosity,
            Preference {
                value: "concise".into(),
                confidence: 0.75,
                evidence_count: 2,
                last_updated: Utc::now(),
            },
        );
        store.save_profile("s1", &profile).await.unwrap();

        let loaded = store.load_profile("s1").await.unwrap();
        let pref = loaded.get(PreferenceCategory::Verbosity).unwrap();
        assert_eq!(pref.value, "concise");
        assert!((pref.confidence - 0.75).abs() < 1e-9);
        assert_eq!(pref.evidence_count, 2);
    }

    #[tokio::test]
    async fn empty_profile_loads_empty() {
        let store = store().await;
        let loaded = store.load_profile("nobody").await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn feedback_roundtrips_in_order() {
        let store = store().await;
        let first = FeedbackEvent::new(
            FeedbackKind::ExplicitPositive,
            "s1",
            Some(2),
            json!({"category": "tone"}),
        );
        let second = FeedbackEvent::new(FeedbackKind::ImplicitEdit, "s1", None, json!({}));
        store.append_feedback(&first).await.unwrap();
        store.append_feedback(&second).await.unwrap();

        let loaded = store.load_feedback("s1").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].kind, FeedbackKind::ExplicitPositive);
        assert_eq!(loaded[0].message_id, Some(2));
        assert_eq!(loaded[0].payload["category"], "tone");
        assert_eq!(loaded[1].kind, FeedbackKind::ImplicitEdit);
    }

    #[tokio::test]
    async fn new_rejects_schema_version_mismatch() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(SCHEMA_META_TABLE).execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO attune_schema_meta (key, value) VALUES ($1, $2)")
            .bind(SCHEMA_VERSION_KEY)
            .bind("999")
            .execute(&pool)
            .await
            .unwrap();

        let err = match SqliteStore::new(pool).await {
            Ok(_) => panic!("schema version mismatch must fail"),
            Err(err) => err,
        };
        assert!(
            err.to_string().contains("incompatible store schema version"),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn connect_creates_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attune.db");
        let store = SqliteStore::connect(&path).await.unwrap();

        let mut session = Session::new("s1".into());
        session.push(MessageRole::User, "persisted", None);
        store.save_session(&session).await.unwrap();

        drop(store);
        let reopened = SqliteStore::connect(&path).await.unwrap();
        let loaded = reopened.load_session("s1").await.unwrap().unwrap();
        assert_eq!(loaded.messages[0].text, "persisted");
    }
}
