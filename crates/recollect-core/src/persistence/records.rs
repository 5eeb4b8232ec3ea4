//! Interaction records

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::interaction::{ArtifactId, EventId, InteractionKind, Metadata, QueuedInteraction};

/// Flat, durable copy of one processed interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: EventId,
    pub artifact_id: Option<ArtifactId>,
    pub kind: InteractionKind,
    #[serde(default)]
    pub metadata: Metadata,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&QueuedInteraction> for InteractionRecord {
    fn from(interaction: &QueuedInteraction) -> Self {
        Self {
            id: interaction.id,
            user_id: interaction.user_id,
            event_id: interaction.event_id,
            artifact_id: interaction.action.artifact_id(),
            kind: interaction.kind(),
            metadata: interaction.metadata.clone().unwrap_or_default(),
            timestamp: interaction.timestamp,
            created_at: interaction.received_at,
        }
    }
}

/// Storage for interaction records, keyed by record ID
pub trait InteractionRecords: Send + Sync {
    /// Insert the record, or replace the one with the same ID
    fn upsert(&self, record: &InteractionRecord) -> Result<(), PersistenceError>;

    /// All records of one event for one user, oldest first
    fn get_all_by_event_id_by_user_id(
        &self,
        event_id: EventId,
        user_id: Uuid,
    ) -> Result<Vec<InteractionRecord>, PersistenceError>;

    /// Delete all records of one event for one user, returning how many went
    fn delete_all_by_event_id_by_user_id(
        &self,
        event_id: EventId,
        user_id: Uuid,
    ) -> Result<usize, PersistenceError>;
}

/// Records held in process memory
#[derive(Debug, Default)]
pub struct InMemoryInteractionRecords {
    records: Mutex<HashMap<Uuid, InteractionRecord>>,
}

impl InMemoryInteractionRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, InteractionRecord>>, PersistenceError> {
        self.records
            .lock()
            .map_err(|e| PersistenceError::Poisoned(e.to_string()))
    }
}

impl InteractionRecords for InMemoryInteractionRecords {
    fn upsert(&self, record: &InteractionRecord) -> Result<(), PersistenceError> {
        self.lock()?.insert(record.id, record.clone());
        Ok(())
    }

    fn get_all_by_event_id_by_user_id(
        &self,
        event_id: EventId,
        user_id: Uuid,
    ) -> Result<Vec<InteractionRecord>, PersistenceError> {
        let mut found: Vec<_> = self
            .lock()?
            .values()
            .filter(|r| r.event_id == event_id && r.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.timestamp, r.id));
        Ok(found)
    }

    fn delete_all_by_event_id_by_user_id(
        &self,
        event_id: EventId,
        user_id: Uuid,
    ) -> Result<usize, PersistenceError> {
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, r| !(r.event_id == event_id && r.user_id == user_id));
        Ok(before - records.len())
    }
}
