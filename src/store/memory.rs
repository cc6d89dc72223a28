use crate::core::session::SessionRecord;
use crate::core::store::SessionStore;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Sessions kept for the lifetime of the process.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<Mutex<HashMap<String, SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<SessionRecord>> {
        let sessions = self.inner.lock().await;
        let record = sessions.get(conversation_id).cloned();
        debug!(
            "Session {} for {conversation_id}",
            if record.is_some() { "HIT" } else { "MISS" }
        );
        Ok(record)
    }

    async fn put(&self, conversation_id: &str, record: SessionRecord) -> Result<()> {
        let mut sessions = self.inner.lock().await;
        debug!("Session PUT for {conversation_id}");
        sessions.insert(conversation_id.to_string(), record);
        Ok(())
    }

    async fn remove(&self, conversation_id: &str) -> Result<()> {
        let mut sessions = self.inner.lock().await;
        sessions.remove(conversation_id);
        debug!("Session REMOVE for {conversation_id}");
        Ok(())
    }
}
