//! Run-scoped natural key -> identity cache.
//!
//! The cache only saves round trips. The sink's unique constraints decide what
//! already exists; a miss here always falls through to an insert-if-absent.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::SinkError;
use crate::model::{EntityKind, Identity};
use crate::sink::Sink;

#[derive(Debug, Default)]
pub struct EntityCache {
    entries: HashMap<EntityKind, HashMap<String, Identity>>,
    /// Keys remembered since the last `settle`; dropped again by `revert`.
    pending: Vec<(EntityKind, String)>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load every requested kind with one read per kind.
    pub async fn preload<S>(sink: &mut S, kinds: &[EntityKind]) -> Result<Self, SinkError>
    where
        S: Sink + ?Sized,
    {
        let mut cache = Self::new();
        for &kind in kinds {
            let rows = sink.load_keys(kind).await?;
            debug!(kind = %kind, rows = rows.len(), "preloaded entity keys");
            cache.entries.entry(kind).or_default().extend(rows);
        }
        info!(kinds = kinds.len(), entries = cache.len(), "entity cache preloaded");
        Ok(cache)
    }

    pub fn lookup(&self, kind: EntityKind, natural_key: &str) -> Option<Identity> {
        self.entries
            .get(&kind)
            .and_then(|keys| keys.get(natural_key))
            .copied()
    }

    pub fn remember(&mut self, kind: EntityKind, natural_key: &str, identity: Identity) {
        let previous = self
            .entries
            .entry(kind)
            .or_default()
            .insert(natural_key.to_string(), identity);
        if previous.is_none() {
            self.pending.push((kind, natural_key.to_string()));
        }
    }

    /// The current record committed: keep everything remembered for it.
    pub fn settle(&mut self) {
        self.pending.clear();
    }

    /// The current record was rolled back: forget identities whose rows no longer exist.
    pub fn revert(&mut self) {
        for (kind, key) in self.pending.drain(..) {
            if let Some(keys) = self.entries.get_mut(&kind) {
                keys.remove(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
