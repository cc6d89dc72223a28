//! Persistence seam for per-conversation sessions.
//!
//! Stores do not lock per conversation. Turns for one conversation must be
//! serialized by the caller.

use crate::core::session::{Session, SessionRecord};
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, conversation_id: &str) -> Result<Option<SessionRecord>>;
    async fn put(&self, conversation_id: &str, record: SessionRecord) -> Result<()>;
    async fn remove(&self, conversation_id: &str) -> Result<()>;
}

/// Loads the session for a conversation, creating an empty one on first use.
pub async fn load(store: &dyn SessionStore, conversation_id: &str) -> Result<Session> {
    let record = store.get(conversation_id).await?;
    if record.is_none() {
        debug!("New session for {conversation_id}");
    }
    Ok(Session::from_record(record.unwrap_or_default()))
}

pub async fn save(store: &dyn SessionStore, conversation_id: &str, session: &Session) -> Result<()> {
    store.put(conversation_id, session.to_record()?).await
}
