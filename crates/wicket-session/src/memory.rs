//! In-memory session store.
//!
//! Backed by a `HashMap` behind a Tokio `RwLock`. Single-process only:
//! sessions vanish on restart. This is the default store and the reference
//! behavior for other backends.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::horizon;
use crate::{SessionData, SessionStore, StoreError};

/// Keeps every session in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: RwLock<HashMap<String, SessionData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<SessionData>, StoreError> {
        if id.is_empty() {
            return Ok(None);
        }
        Ok(self.entities.read().await.get(id).cloned())
    }

    async fn set(&self, session: SessionData) -> Result<SessionData, StoreError> {
        self.entities
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn del(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.entities.write().await.remove(id).is_some())
    }

    async fn reap(&self, max_age: Duration) -> Result<Vec<String>, StoreError> {
        let horizon = horizon(max_age);
        let mut reaped = Vec::new();

        // Full sweep under one write lock. Fine for a process-local map.
        self.entities.write().await.retain(|id, session| {
            if session.is_stale(horizon) {
                reaped.push(id.clone());
                false
            } else {
                true
            }
        });

        if !reaped.is_empty() {
            tracing::debug!(count = reaped.len(), "reaped stale sessions");
        }
        Ok(reaped)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entities.read().await.len())
    }
}
