//! Natural key -> identity resolution.
//!
//! Reference entities are resolved by cache, then insert-if-absent, then re-read on
//! conflict. Games and events are never created here; they are looked up, and the
//! fact writer records their identities once it has written them.

use serde::Serialize;
use tracing::debug;

use crate::cache::EntityCache;
use crate::error::{LoadError, SinkError};
use crate::model::{EntityKind, EntityRef, EventKey, Identity};
use crate::sink::Sink;
use crate::walker::EventRef;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub inserted: u64,
    pub reused: u64,
}

impl ResolverStats {
    fn absorb(&mut self, other: ResolverStats) {
        self.inserted += other.inserted;
        self.reused += other.reused;
    }
}

#[derive(Debug, Default)]
pub struct IdentityResolver {
    cache: EntityCache,
    stats: ResolverStats,
    /// Counts for the record in flight; folded into `stats` by `settle`.
    pending: ResolverStats,
}

impl IdentityResolver {
    pub fn new(cache: EntityCache) -> Self {
        Self {
            cache,
            ..Self::default()
        }
    }

    /// Preload every kind the loader resolves, games and events included.
    pub async fn preload<S>(sink: &mut S) -> Result<Self, SinkError>
    where
        S: Sink + ?Sized,
    {
        let mut kinds = EntityKind::REFERENCE.to_vec();
        kinds.extend([EntityKind::Game, EntityKind::Event]);
        Ok(Self::new(EntityCache::preload(sink, &kinds).await?))
    }

    pub async fn resolve<S>(&mut self, sink: &mut S, entity: &EntityRef) -> Result<Identity, LoadError>
    where
        S: Sink + ?Sized,
    {
        let kind = entity.kind();
        let key = entity.natural_key.as_str();
        if let Some(id) = self.cache.lookup(kind, key) {
            self.pending.reused += 1;
            return Ok(id);
        }

        let inserted = sink
            .insert_entity(entity)
            .await
            .map_err(|e| LoadError::resolving(kind, key, e))?;
        let id = match inserted {
            Some(id) => {
                debug!(kind = %kind, key, id, "inserted entity");
                self.pending.inserted += 1;
                id
            }
            // Someone else holds the key: another run, or an earlier record this run
            // that the cache has since forgotten.
            None => {
                let found = sink
                    .find_entity(kind, key)
                    .await
                    .map_err(|e| LoadError::resolving(kind, key, e))?;
                let id = found.ok_or_else(|| LoadError::Resolution {
                    kind,
                    key: key.to_string(),
                    reason: "insert conflicted but no row holds the key".to_string(),
                })?;
                self.pending.reused += 1;
                id
            }
        };

        self.cache.remember(kind, key, id);
        Ok(id)
    }

    /// Identity of a game already in the sink. Odds for unloaded games are refused.
    pub async fn resolve_game<S>(&mut self, sink: &mut S, game_id: i64) -> Result<Identity, LoadError>
    where
        S: Sink + ?Sized,
    {
        let key = game_id.to_string();
        if let Some(id) = self.cache.lookup(EntityKind::Game, &key) {
            return Ok(id);
        }
        let found = sink
            .find_game(game_id)
            .await
            .map_err(|e| LoadError::resolving(EntityKind::Game, &key, e))?;
        let id = found.ok_or_else(|| LoadError::Resolution {
            kind: EntityKind::Game,
            key: key.clone(),
            reason: "game has not been loaded".to_string(),
        })?;
        self.cache.remember(EntityKind::Game, &key, id);
        Ok(id)
    }

    /// Resolve an event's participants, scoped to the already resolved `sport_id`, into its
    /// identity-defining key.
    pub async fn event_key<S>(
        &mut self,
        sink: &mut S,
        event: &EventRef,
        sport_id: Identity,
    ) -> Result<EventKey, LoadError>
    where
        S: Sink + ?Sized,
    {
        Ok(EventKey {
            home_participant_id: self.resolve(sink, &event.home.in_sport(sport_id)).await?,
            away_participant_id: self.resolve(sink, &event.away.in_sport(sport_id)).await?,
            commence_time: event.commence_time,
        })
    }

    pub async fn resolve_event<S>(&mut self, sink: &mut S, key: &EventKey) -> Result<Identity, LoadError>
    where
        S: Sink + ?Sized,
    {
        let cache_key = key.cache_key();
        if let Some(id) = self.cache.lookup(EntityKind::Event, &cache_key) {
            return Ok(id);
        }
        let found = sink
            .find_event(key)
            .await
            .map_err(|e| LoadError::resolving(EntityKind::Event, &cache_key, e))?;
        let id = found.ok_or_else(|| LoadError::Resolution {
            kind: EntityKind::Event,
            key: cache_key.clone(),
            reason: "event has not been loaded".to_string(),
        })?;
        self.cache.remember(EntityKind::Event, &cache_key, id);
        Ok(id)
    }

    /// Cache a game or event identity the fact writer just wrote.
    pub fn record(&mut self, kind: EntityKind, natural_key: &str, identity: Identity) {
        self.cache.remember(kind, natural_key, identity);
    }

    pub fn settle(&mut self) {
        self.cache.settle();
        let pending = std::mem::take(&mut self.pending);
        self.stats.absorb(pending);
    }

    pub fn revert(&mut self) {
        self.cache.revert();
        self.pending = ResolverStats::default();
    }

    pub fn stats(&self) -> ResolverStats {
        self.stats
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
