//! Persistence backend contracts
//!
//! Two backends with different shapes: a primary structured store
//! addressed by (context, locator), and a fallback key-value store that
//! can only read and write whole JSON slots. Which backends exist is
//! decided at construction time through [`Backends`]; the sync layer
//! never probes a store for capabilities at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::review::{ContextId, Grade, ReviewSchedule};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Review schedule as persisted to either backend: absolute
/// epoch-millisecond timestamps, nothing locale-specific.
///
/// Only reviewed schedules are ever persisted, so both timestamps are
/// always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceRecord {
    pub due_at: i64,
    pub last_reviewed_at: i64,
    pub interval: f64,
    pub ease: f64,
    pub review_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_grade: Option<i32>,
}

impl PersistenceRecord {
    /// Convert an in-memory schedule for persistence. Returns `None`
    /// for schedules that have never been reviewed; those are implicit
    /// and never written.
    pub fn from_schedule(schedule: &ReviewSchedule) -> Option<Self> {
        let due_at = schedule.due_at?;
        let last_reviewed_at = schedule.last_reviewed_at?;
        Some(Self {
            due_at: due_at.timestamp_millis(),
            last_reviewed_at: last_reviewed_at.timestamp_millis(),
            interval: schedule.interval,
            ease: schedule.ease_factor,
            review_count: schedule.review_count,
            last_grade: schedule.last_grade.map(i32::from),
        })
    }

    /// Rehydrate an in-memory schedule. Timestamps come back at
    /// millisecond precision; a record with an out-of-range grade keeps
    /// the schedule but drops the grade field.
    pub fn into_schedule(self) -> ReviewSchedule {
        ReviewSchedule {
            due_at: Some(millis_to_datetime(self.due_at)),
            last_reviewed_at: Some(millis_to_datetime(self.last_reviewed_at)),
            last_grade: self.last_grade.and_then(|g| Grade::try_from(g).ok()),
            review_count: self.review_count,
            interval: self.interval,
            ease_factor: self.ease,
        }
    }
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Primary structured store, addressed by (context, locator)
#[async_trait]
pub trait PrimaryStore: Send + Sync {
    /// All records for one document context. An unknown context is an
    /// empty map, not an error.
    async fn get_by_context(
        &self,
        context: &ContextId,
    ) -> Result<HashMap<String, PersistenceRecord>>;

    /// Insert or replace one record
    async fn upsert(
        &self,
        context: &ContextId,
        locator: &str,
        record: &PersistenceRecord,
    ) -> Result<()>;
}

/// Fallback flat key-value store: whole-slot reads and writes, no
/// per-key addressing inside a slot
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;
}

/// Backend handles available to the sync layer, fixed at construction
#[derive(Clone, Default)]
pub struct Backends {
    primary: Option<Arc<dyn PrimaryStore>>,
    fallback: Option<Arc<dyn KeyValueStore>>,
}

impl Backends {
    pub fn new(
        primary: Option<Arc<dyn PrimaryStore>>,
        fallback: Option<Arc<dyn KeyValueStore>>,
    ) -> Self {
        Self { primary, fallback }
    }

    pub fn with_primary(primary: Arc<dyn PrimaryStore>) -> Self {
        Self {
            primary: Some(primary),
            fallback: None,
        }
    }

    pub fn primary(&self) -> Option<&Arc<dyn PrimaryStore>> {
        self.primary.as_ref()
    }

    pub fn fallback(&self) -> Option<&Arc<dyn KeyValueStore>> {
        self.fallback.as_ref()
    }
}
