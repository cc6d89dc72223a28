//! Per-conversation state: variable scope plus the pad of evaluated expressions.

use crate::math::value::Value;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::collections::BTreeMap;
use tracing::warn;

pub type Scope = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub scope: Scope,
    pub pad: Vec<String>,
}

/// Stored form of a session. Both fields may be missing for a conversation
/// that has never been evaluated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pad: Option<Vec<String>>,
}

impl Session {
    pub fn from_record(record: SessionRecord) -> Self {
        let scope = match record.scope.as_deref() {
            Some(text) => decode_scope(text),
            None => Scope::new(),
        };
        Self {
            scope,
            pad: record.pad.unwrap_or_default(),
        }
    }

    pub fn to_record(&self) -> Result<SessionRecord> {
        Ok(SessionRecord {
            scope: Some(encode_scope(&self.scope)?),
            pad: Some(self.pad.clone()),
        })
    }

    /// Clears scope and pad, handing back what was there before.
    pub fn reset(&mut self) -> Session {
        std::mem::take(self)
    }

    pub fn is_empty(&self) -> bool {
        self.scope.is_empty() && self.pad.is_empty()
    }
}

pub fn encode_scope(scope: &Scope) -> Result<String> {
    serde_json::to_string(scope).context("Failed to serialize scope")
}

/// Revives a persisted scope.
///
/// A document that is not a JSON object yields an empty scope. Inside a valid
/// object, bindings that cannot be revived are dropped one by one.
pub fn decode_scope(text: &str) -> Scope {
    let object: Map<String, serde_json::Value> = match serde_json::from_str(text) {
        Ok(object) => object,
        Err(e) => {
            warn!("Discarding unreadable scope: {e}");
            return Scope::new();
        }
    };

    let mut scope = Scope::new();
    for (name, raw) in object {
        match serde_json::from_value::<Value>(raw) {
            Ok(value) => {
                scope.insert(name, value);
            }
            Err(e) => warn!("Dropping variable {name} from scope: {e}"),
        }
    }
    scope
}
