//! Learned LUT preferences keyed by normalized camera metadata.
//!
//! Every mutation is persisted before it returns and then announced on a
//! broadcast channel. Listeners compare the announced key with their own
//! clip's signature and re-resolve when it matches.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use clipgrade_models::{LearnedMapping, LutId, MappingChange, MetadataKey};

use crate::error::LutResult;
use crate::store::RecordStore;

/// Buffered notifications per subscriber before the oldest are dropped.
const NOTIFY_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct Mappings {
    /// Insertion order, used when persisting
    order: Vec<MetadataKey>,
    by_key: HashMap<MetadataKey, LearnedMapping>,
}

impl Mappings {
    fn from_records(records: Vec<LearnedMapping>) -> Self {
        let mut mappings = Self::default();
        for record in records {
            let key = record.key();
            // Stored keys may predate normalization changes
            let record = LearnedMapping::new(&key, record.lut_id, record.lut_name);
            mappings.upsert(key, record);
        }
        mappings
    }

    /// Insert or overwrite; an overwritten key keeps its position.
    fn upsert(&mut self, key: MetadataKey, mapping: LearnedMapping) -> Option<LearnedMapping> {
        let previous = self.by_key.insert(key.clone(), mapping);
        if previous.is_none() {
            self.order.push(key);
        }
        previous
    }

    fn remove(&mut self, key: &MetadataKey) -> Option<(usize, LearnedMapping)> {
        let mapping = self.by_key.remove(key)?;
        let index = self.order.iter().position(|k| k == key)?;
        self.order.remove(index);
        Some((index, mapping))
    }

    fn records(&self) -> Vec<LearnedMapping> {
        self.order
            .iter()
            .filter_map(|k| self.by_key.get(k).cloned())
            .collect()
    }
}

/// Persistent map from metadata signature to the user's preferred LUT.
#[derive(Clone)]
pub struct LearningStore {
    store: Arc<dyn RecordStore<LearnedMapping>>,
    mappings: Arc<RwLock<Mappings>>,
    notifier: broadcast::Sender<MappingChange>,
}

impl std::fmt::Debug for LearningStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LearningStore")
            .field("subscribers", &self.notifier.receiver_count())
            .finish_non_exhaustive()
    }
}

impl LearningStore {
    /// Load all mappings from `store`.
    pub async fn load(store: Arc<dyn RecordStore<LearnedMapping>>) -> LutResult<Self> {
        let records = store.load().await?;
        let mappings = Mappings::from_records(records);
        info!(count = mappings.order.len(), "Loaded learned LUT mappings");

        let (notifier, _) = broadcast::channel(NOTIFY_CAPACITY);
        Ok(Self {
            store,
            mappings: Arc::new(RwLock::new(mappings)),
            notifier,
        })
    }

    /// Receive a [`MappingChange`] for every subsequent learn or forget.
    pub fn subscribe(&self) -> broadcast::Receiver<MappingChange> {
        self.notifier.subscribe()
    }

    /// Exact lookup by normalized key.
    pub async fn lookup(&self, key: &MetadataKey) -> Option<LearnedMapping> {
        self.mappings.read().await.by_key.get(key).cloned()
    }

    /// All mappings in insertion order.
    pub async fn all(&self) -> Vec<LearnedMapping> {
        self.mappings.read().await.records()
    }

    /// Store or overwrite the mapping for `key`, persist it, then notify.
    pub async fn learn(&self, key: &MetadataKey, lut_id: LutId, lut_name: impl Into<String>) -> LutResult<LearnedMapping> {
        let mapping = LearnedMapping::new(key, lut_id, lut_name);

        {
            let mut mappings = self.mappings.write().await;
            let previous = mappings.upsert(key.clone(), mapping.clone());
            if let Err(e) = self.store.save(&mappings.records()).await {
                match previous {
                    Some(previous) => {
                        mappings.upsert(key.clone(), previous);
                    }
                    None => {
                        mappings.remove(key);
                    }
                }
                return Err(e);
            }
        }

        info!(key = %key, lut_id = %mapping.lut_id, "Learned LUT preference");
        self.notify(MappingChange {
            key: key.clone(),
            lut_id: Some(mapping.lut_id.clone()),
            lut_name: Some(mapping.lut_name.clone()),
        });
        Ok(mapping)
    }

    /// Remove the mapping for `key`. Returns whether one existed.
    pub async fn forget(&self, key: &MetadataKey) -> LutResult<bool> {
        {
            let mut mappings = self.mappings.write().await;
            let Some((index, removed)) = mappings.remove(key) else {
                return Ok(false);
            };
            if let Err(e) = self.store.save(&mappings.records()).await {
                mappings.order.insert(index, key.clone());
                mappings.by_key.insert(key.clone(), removed);
                return Err(e);
            }
        }

        info!(key = %key, "Forgot LUT preference");
        self.notify(MappingChange {
            key: key.clone(),
            lut_id: None,
            lut_name: None,
        });
        Ok(true)
    }

    fn notify(&self, change: MappingChange) {
        // No subscribers is not an error
        if self.notifier.send(change).is_err() {
            debug!("No listeners for mapping change");
        }
    }
}
