pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::store::SessionStore;
use disk::DiskSessionStore;
use memory::MemorySessionStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Opens the persistent session store, falling back to memory when the data
/// directory cannot be used.
pub fn open_store(config: &AppConfig) -> Arc<dyn SessionStore> {
    let opened = config
        .default_data_path()
        .and_then(|path| DiskSessionStore::open(&path));
    match opened {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("Sessions will not be persisted: {e:#}");
            debug!("Using in-memory session store");
            Arc::new(MemorySessionStore::new())
        }
    }
}
