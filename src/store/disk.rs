use crate::core::session::SessionRecord;
use crate::core::store::SessionStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PARTITION: &str = "sessions";

/// Sessions persisted as JSON records in a fjall partition.
pub struct DiskSessionStore {
    keyspace: Keyspace,
    sessions: PartitionHandle,
}

impl DiskSessionStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory {}", path.display()))?;
        let keyspace = Config::new(path.join("sessions"))
            .open()
            .context("Failed to open session keyspace")?;
        let sessions = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .context("Failed to open session partition")?;
        debug!("Opened session store at {}", path.display());
        Ok(Self {
            keyspace,
            sessions,
        })
    }

    /// Syncs pending writes to disk.
    fn flush(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to persist sessions")
    }
}

#[async_trait]
impl SessionStore for DiskSessionStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<SessionRecord>> {
        let Some(bytes) = self.sessions.get(conversation_id)? else {
            debug!("Session MISS for {conversation_id}");
            return Ok(None);
        };
        debug!("Session HIT for {conversation_id}");
        let record = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupted session record for {conversation_id}"))?;
        Ok(Some(record))
    }

    async fn put(&self, conversation_id: &str, record: SessionRecord) -> Result<()> {
        let bytes = serde_json::to_vec(&record)?;
        self.sessions.insert(conversation_id, bytes)?;
        // A turn is only complete once its session is durable.
        self.flush()?;
        debug!("Session PUT for {conversation_id}");
        Ok(())
    }

    async fn remove(&self, conversation_id: &str) -> Result<()> {
        self.sessions.remove(conversation_id)?;
        self.flush()?;
        debug!("Session REMOVE for {conversation_id}");
        Ok(())
    }
}
