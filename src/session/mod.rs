pub mod manager;
pub mod store;
pub mod types;

pub use manager::{SessionEntry, SessionManager, evict_if_needed};
pub use store::{DurableStore, SqliteStore};
pub use types::{ContextWindow, Message, MessageRole, Session, SessionDigest};
