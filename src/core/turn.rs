//! One user turn: load the session, evaluate, save it back.

use crate::core::session::Session;
use crate::core::store::{self, SessionStore};
use crate::math::{Evaluator, ExpressionEngine, LineResult};
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Transport side "is typing" notification.
#[async_trait]
pub trait Presence: Send + Sync {
    async fn typing(&self, conversation_id: &str) -> Result<()>;
}

pub struct NoPresence;

#[async_trait]
impl Presence for NoPresence {
    async fn typing(&self, _conversation_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Evaluates `text` for a conversation.
///
/// Callers must not run two turns for the same conversation concurrently.
#[instrument(skip(store, evaluator, presence, text))]
pub async fn run_turn<E: ExpressionEngine>(
    store: &dyn SessionStore,
    evaluator: &Evaluator<E>,
    presence: &dyn Presence,
    conversation_id: &str,
    text: &str,
) -> Result<Vec<LineResult>> {
    let mut session = store::load(store, conversation_id).await?;

    if let Err(e) = presence.typing(conversation_id).await {
        debug!("Typing indicator failed: {e}");
    }

    let results = evaluator.evaluate(&mut session, text);
    store::save(store, conversation_id, &session).await?;
    debug!(
        "Turn evaluated {} lines, pad now {}",
        results.len(),
        session.pad.len()
    );
    Ok(results)
}

/// Clears a conversation's scope and pad, returning what they held.
pub async fn reset_conversation(store: &dyn SessionStore, conversation_id: &str) -> Result<Session> {
    let mut session = store::load(store, conversation_id).await?;
    let previous = session.reset();
    store::save(store, conversation_id, &session).await?;
    Ok(previous)
}
