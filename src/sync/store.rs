//! Review store cache and backend reconciliation
//!
//! [`ReviewSync`] owns the locator→schedule map for exactly one active
//! document context. Loads go primary-then-fallback; writes go through
//! to the primary and degrade to a whole-cache blob in the fallback
//! slot. Backend failures never propagate past this module: the
//! in-memory cache stays authoritative for the session, and "no history"
//! is a legitimate state, not an error.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{debug, info, warn};

use super::backend::{Backends, PersistenceRecord};
use crate::review::{ContextId, ReviewSchedule};

/// Fixed fallback-slot key for a context
fn fallback_key(context: &ContextId) -> String {
    format!("cloze-review/{}", context)
}

#[derive(Default)]
struct ContextState {
    context: Option<ContextId>,
    loaded: bool,
}

/// Sync layer: in-memory review store plus two-backend reconciliation
pub struct ReviewSync {
    backends: Backends,
    /// Locator → schedule for the active context. Guarded by a std
    /// mutex; critical sections are short and never cross an await.
    cache: Mutex<HashMap<String, ReviewSchedule>>,
    state: Mutex<ContextState>,
    /// Serializes backend loads so concurrent triggers share one read
    load_lock: tokio::sync::Mutex<()>,
}

impl ReviewSync {
    pub fn new(backends: Backends) -> Self {
        Self {
            backends,
            cache: Mutex::new(HashMap::new()),
            state: Mutex::new(ContextState::default()),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Whether `context` is the active, already-loaded context
    pub fn is_loaded(&self, context: &ContextId) -> bool {
        let state = self.state.lock().unwrap();
        state.loaded && state.context.as_ref() == Some(context)
    }

    /// Load `context` unless it has already loaded once this session.
    ///
    /// Single-flight: concurrent callers wait on the same load instead
    /// of issuing duplicate backend reads, and once a context has
    /// loaded, re-renders never reload; only [`force_resync`] does.
    ///
    /// [`force_resync`]: ReviewSync::force_resync
    pub async fn ensure_loaded(&self, context: &ContextId) {
        if self.is_loaded(context) {
            return;
        }

        let _guard = self.load_lock.lock().await;
        // A concurrent caller may have finished this load while we
        // waited on the guard
        if self.is_loaded(context) {
            return;
        }

        self.load_from_backends(context).await;
    }

    /// Reload `context` from the backends, bypassing the loaded-once
    /// discipline
    pub async fn force_resync(&self, context: &ContextId) {
        let _guard = self.load_lock.lock().await;
        self.load_from_backends(context).await;
    }

    /// Replace the cache from the primary store, falling back to the
    /// key-value slot on primary *error* (not on empty results). Both
    /// backends failing or missing leaves the cache empty: no history
    /// yet.
    async fn load_from_backends(&self, context: &ContextId) {
        let schedules = self.read_backends(context).await;

        let mut cache = self.cache.lock().unwrap();
        *cache = schedules;
        drop(cache);

        let mut state = self.state.lock().unwrap();
        state.context = Some(context.clone());
        state.loaded = true;
    }

    async fn read_backends(&self, context: &ContextId) -> HashMap<String, ReviewSchedule> {
        if let Some(primary) = self.backends.primary() {
            match primary.get_by_context(context).await {
                Ok(records) => {
                    debug!(
                        "loaded {} schedule(s) for context '{}' from primary store",
                        records.len(),
                        context
                    );
                    return records
                        .into_iter()
                        .map(|(locator, record)| (locator, record.into_schedule()))
                        .collect();
                }
                Err(err) => {
                    warn!(
                        "primary store failed for context '{}': {} — trying fallback",
                        context, err
                    );
                }
            }
        }

        if let Some(fallback) = self.backends.fallback() {
            match fallback.get(&fallback_key(context)).await {
                Ok(Some(value)) => {
                    match serde_json::from_value::<HashMap<String, PersistenceRecord>>(value) {
                        Ok(records) => {
                            info!(
                                "loaded {} schedule(s) for context '{}' from fallback store",
                                records.len(),
                                context
                            );
                            return records
                                .into_iter()
                                .map(|(locator, record)| (locator, record.into_schedule()))
                                .collect();
                        }
                        Err(err) => {
                            warn!(
                                "fallback slot for context '{}' is malformed: {}",
                                context, err
                            );
                        }
                    }
                }
                Ok(None) => {
                    debug!("no fallback slot for context '{}'", context);
                }
                Err(err) => {
                    warn!("fallback store failed for context '{}': {}", context, err);
                }
            }
        }

        // No backend produced history; an empty store is a valid start
        HashMap::new()
    }

    /// Write a schedule into the cache without persisting. This is the
    /// "update cache" step of grading; visuals may be refreshed from
    /// the cache immediately, before [`persist`] completes.
    ///
    /// [`persist`]: ReviewSync::persist
    pub fn stage(&self, locator: &str, schedule: ReviewSchedule) {
        let mut cache = self.cache.lock().unwrap();
        cache.insert(locator.to_string(), schedule);
    }

    /// Write the cached schedule for `locator` through to storage:
    /// primary upsert first; on primary failure, the entire cache as
    /// one blob to the fallback slot (the fallback has no per-key
    /// addressing). Both failing is logged and swallowed.
    pub async fn persist(&self, context: &ContextId, locator: &str) {
        let record = {
            let cache = self.cache.lock().unwrap();
            cache
                .get(locator)
                .and_then(PersistenceRecord::from_schedule)
        };
        let Some(record) = record else {
            debug!("nothing to persist for locator '{}'", locator);
            return;
        };

        if let Some(primary) = self.backends.primary() {
            match primary.upsert(context, locator, &record).await {
                Ok(()) => {
                    debug!("persisted '{}' in context '{}'", locator, context);
                    return;
                }
                Err(err) => {
                    warn!(
                        "primary store write failed for '{}' in context '{}': {} — writing fallback blob",
                        locator, context, err
                    );
                }
            }
        }

        self.write_fallback_blob(context).await;
    }

    /// Stage and persist in one call, for hosts that do not need the
    /// optimistic-update split
    pub async fn save(&self, context: &ContextId, locator: &str, schedule: ReviewSchedule) {
        self.stage(locator, schedule);
        self.persist(context, locator).await;
    }

    async fn write_fallback_blob(&self, context: &ContextId) {
        let Some(fallback) = self.backends.fallback() else {
            warn!(
                "no fallback store; schedules for context '{}' stay cache-only this session",
                context
            );
            return;
        };

        let records: HashMap<String, PersistenceRecord> = {
            let cache = self.cache.lock().unwrap();
            cache
                .iter()
                .filter_map(|(locator, schedule)| {
                    PersistenceRecord::from_schedule(schedule)
                        .map(|record| (locator.clone(), record))
                })
                .collect()
        };

        let value = match serde_json::to_value(&records) {
            Ok(value) => value,
            Err(err) => {
                warn!("failed to serialize fallback blob: {}", err);
                return;
            }
        };

        match fallback.set(&fallback_key(context), value).await {
            Ok(()) => info!(
                "wrote {} schedule(s) for context '{}' to fallback store",
                records.len(),
                context
            ),
            Err(err) => warn!(
                "fallback store write failed for context '{}': {} — cache stays authoritative",
                context, err
            ),
        }
    }

    /// Cached schedule for one locator
    pub fn schedule(&self, locator: &str) -> Option<ReviewSchedule> {
        self.cache.lock().unwrap().get(locator).cloned()
    }

    /// Snapshot of the whole cache
    pub fn snapshot(&self) -> HashMap<String, ReviewSchedule> {
        self.cache.lock().unwrap().clone()
    }
}
