//! In-process sink with the same keys and conflict rules as the Postgres schema.
//!
//! Used for dry runs and tests. Writes go straight into the tables and leave an
//! undo entry in the open transaction's journal. A savepoint is a position in that
//! journal; rolling back replays the entries after it in reverse.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tracing::debug;

use super::{Sink, SinkResult, Table};
use crate::error::SinkError;
use crate::model::{
    EntityAttributes, EntityKind, EntityRef, EventKey, EventRow, GameOddsKey, GameRow, GameState,
    Identity, OddsRow, OddsTarget, OutcomeType,
};

#[derive(Debug, Clone)]
pub struct StoredEntity {
    pub id: Identity,
    pub attributes: EntityAttributes,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: Identity,
    entities: HashMap<EntityKind, BTreeMap<String, StoredEntity>>,
    games: BTreeMap<i64, GameRow>,
    events: BTreeMap<Identity, EventRow>,
    event_keys: HashMap<EventKey, Identity>,
    game_odds: BTreeMap<GameOddsKey, Identity>,
    game_odds_ids: HashSet<Identity>,
    odds: BTreeMap<(Identity, OutcomeType), (Identity, OddsRow)>,
}

impl Tables {
    fn next_id(&mut self) -> Identity {
        self.next_id += 1;
        self.next_id
    }
}

/// How to take back one write. Identities are not reused, as with a sequence.
#[derive(Debug)]
enum Undo {
    Entity(EntityKind, String),
    GameInserted(i64),
    GameState(i64, GameState),
    EventInserted(Identity, EventKey),
    EventExternalId(Identity),
    GameOdds(GameOddsKey, Identity),
    Odds(Identity, OutcomeType),
}

impl Undo {
    fn apply(self, tables: &mut Tables) {
        match self {
            Undo::Entity(kind, key) => {
                if let Some(rows) = tables.entities.get_mut(&kind) {
                    rows.remove(&key);
                }
            }
            Undo::GameInserted(id) => {
                tables.games.remove(&id);
            }
            Undo::GameState(id, state) => {
                if let Some(game) = tables.games.get_mut(&id) {
                    game.state = state;
                }
            }
            Undo::EventInserted(id, key) => {
                tables.events.remove(&id);
                tables.event_keys.remove(&key);
            }
            Undo::EventExternalId(id) => {
                if let Some(event) = tables.events.get_mut(&id) {
                    event.external_id = None;
                }
            }
            Undo::GameOdds(key, id) => {
                tables.game_odds.remove(&key);
                tables.game_odds_ids.remove(&id);
            }
            Undo::Odds(game_odds_id, outcome_type) => {
                tables.odds.remove(&(game_odds_id, outcome_type));
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Tables,
    /// Open transaction's undo entries, oldest first. `None` outside a transaction.
    journal: Option<Vec<Undo>>,
    savepoint: Option<usize>,
    rejected: HashSet<(EntityKind, String)>,
    ops_before_outage: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse inserts of this natural key, as a check constraint would.
    pub fn reject_key(&mut self, kind: EntityKind, natural_key: &str) {
        self.rejected.insert((kind, natural_key.to_string()));
    }

    /// Lose the connection after `ops` more operations.
    pub fn disconnect_after(&mut self, ops: usize) {
        self.ops_before_outage = Some(ops);
    }

    pub fn reconnect(&mut self) {
        self.ops_before_outage = None;
    }

    /// Game row, if any. Includes writes of a still-open transaction.
    pub fn game(&self, id: i64) -> Option<&GameRow> {
        self.tables.games.get(&id)
    }

    /// Reference entity, if any.
    pub fn entity(&self, kind: EntityKind, natural_key: &str) -> Option<&StoredEntity> {
        self.tables
            .entities
            .get(&kind)
            .and_then(|rows| rows.get(natural_key))
    }

    /// Stored outcomes in insertion-independent order.
    pub fn odds(&self) -> impl Iterator<Item = &OddsRow> {
        self.tables.odds.values().map(|(_, row)| row)
    }

    /// Row count, without going through the async trait.
    pub fn rows(&self, table: Table) -> i64 {
        let entities = |kind: EntityKind| self.tables.entities.get(&kind).map_or(0, BTreeMap::len);
        let n = match table {
            Table::Sports => entities(EntityKind::Sport),
            Table::Seasons => entities(EntityKind::Season),
            Table::Teams => entities(EntityKind::Team),
            Table::Venues => entities(EntityKind::Venue),
            Table::Books => entities(EntityKind::Book),
            Table::WagerTypes => entities(EntityKind::WagerType),
            Table::Participants => entities(EntityKind::Participant),
            Table::Players => entities(EntityKind::Player),
            Table::Games => self.tables.games.len(),
            Table::Events => self.tables.events.len(),
            Table::GameOdds => self.tables.game_odds.len(),
            Table::Odds => self.tables.odds.len(),
        };
        n as i64
    }

    /// Undo every journaled write after `mark`, newest first.
    fn undo_to(&mut self, mark: usize) {
        if let Some(journal) = self.journal.as_mut() {
            let tail = journal.split_off(mark.min(journal.len()));
            for entry in tail.into_iter().rev() {
                entry.apply(&mut self.tables);
            }
        }
    }

    fn abort(&mut self) {
        self.undo_to(0);
        self.journal = None;
        self.savepoint = None;
    }

    fn check_connection(&mut self) -> SinkResult<()> {
        match self.ops_before_outage {
            Some(0) => {
                self.abort();
                Err(SinkError::Unavailable("connection reset by peer".to_string()))
            }
            Some(ref mut left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn read(&mut self) -> SinkResult<&Tables> {
        self.check_connection()?;
        Ok(&self.tables)
    }

    fn write(&mut self) -> SinkResult<(&mut Tables, &mut Vec<Undo>)> {
        self.check_connection()?;
        match self.journal.as_mut() {
            Some(journal) => Ok((&mut self.tables, journal)),
            None => Err(SinkError::NoTransaction),
        }
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn begin(&mut self) -> SinkResult<()> {
        self.check_connection()?;
        if self.journal.is_some() {
            self.abort();
        }
        self.journal = Some(Vec::new());
        Ok(())
    }

    async fn commit(&mut self) -> SinkResult<()> {
        self.check_connection()?;
        self.journal.take().ok_or(SinkError::NoTransaction)?;
        self.savepoint = None;
        Ok(())
    }

    async fn rollback(&mut self) -> SinkResult<()> {
        self.abort();
        Ok(())
    }

    async fn savepoint(&mut self) -> SinkResult<()> {
        let (_, journal) = self.write()?;
        let mark = journal.len();
        self.savepoint = Some(mark);
        Ok(())
    }

    async fn release_savepoint(&mut self) -> SinkResult<()> {
        self.write()?;
        self.savepoint = None;
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self) -> SinkResult<()> {
        self.write()?;
        let mark = self
            .savepoint
            .take()
            .ok_or_else(|| SinkError::Rejected("no savepoint to roll back to".to_string()))?;
        self.undo_to(mark);
        Ok(())
    }

    async fn load_keys(&mut self, kind: EntityKind) -> SinkResult<Vec<(String, Identity)>> {
        let tables = self.read()?;
        let keys = match kind {
            EntityKind::Game => tables
                .games
                .keys()
                .map(|id| (id.to_string(), *id))
                .collect(),
            EntityKind::Event => tables
                .event_keys
                .iter()
                .map(|(key, id)| (key.cache_key(), *id))
                .collect(),
            _ => tables
                .entities
                .get(&kind)
                .map(|rows| {
                    rows.iter()
                        .map(|(key, stored)| (key.clone(), stored.id))
                        .collect()
                })
                .unwrap_or_default(),
        };
        Ok(keys)
    }

    async fn insert_entity(&mut self, entity: &EntityRef) -> SinkResult<Option<Identity>> {
        let kind = entity.kind();
        if self.rejected.contains(&(kind, entity.natural_key.clone())) {
            self.check_connection()?;
            return Err(SinkError::Rejected(format!(
                "new row for {} violates check constraint",
                Table::for_kind(kind)
            )));
        }

        let (tables, journal) = self.write()?;
        if tables
            .entities
            .get(&kind)
            .is_some_and(|rows| rows.contains_key(&entity.natural_key))
        {
            return Ok(None);
        }

        let id = tables.next_id();
        tables.entities.entry(kind).or_default().insert(
            entity.natural_key.clone(),
            StoredEntity {
                id,
                attributes: entity.attributes.clone(),
            },
        );
        journal.push(Undo::Entity(kind, entity.natural_key.clone()));
        debug!(kind = %kind, key = %entity.natural_key, id, "memory sink inserted entity");
        Ok(Some(id))
    }

    async fn find_entity(
        &mut self,
        kind: EntityKind,
        natural_key: &str,
    ) -> SinkResult<Option<Identity>> {
        let tables = self.read()?;
        Ok(tables
            .entities
            .get(&kind)
            .and_then(|rows| rows.get(natural_key))
            .map(|stored| stored.id))
    }

    async fn upsert_game(&mut self, game: &GameRow) -> SinkResult<Identity> {
        let (tables, journal) = self.write()?;
        match tables.games.get_mut(&game.id) {
            Some(existing) => {
                let previous = std::mem::replace(&mut existing.state, game.state.clone());
                journal.push(Undo::GameState(game.id, previous));
            }
            None => {
                tables.games.insert(game.id, game.clone());
                journal.push(Undo::GameInserted(game.id));
            }
        }
        Ok(game.id)
    }

    async fn find_game(&mut self, id: i64) -> SinkResult<Option<Identity>> {
        let tables = self.read()?;
        Ok(tables.games.contains_key(&id).then_some(id))
    }

    async fn upsert_event(&mut self, event: &EventRow) -> SinkResult<Identity> {
        let (tables, journal) = self.write()?;
        if let Some(&id) = tables.event_keys.get(&event.key) {
            if let Some(existing) = tables.events.get_mut(&id) {
                if existing.external_id.is_none() && event.external_id.is_some() {
                    existing.external_id = event.external_id.clone();
                    journal.push(Undo::EventExternalId(id));
                }
            }
            return Ok(id);
        }

        let id = tables.next_id();
        tables.event_keys.insert(event.key, id);
        tables.events.insert(id, event.clone());
        journal.push(Undo::EventInserted(id, event.key));
        Ok(id)
    }

    async fn find_event(&mut self, key: &EventKey) -> SinkResult<Option<Identity>> {
        let tables = self.read()?;
        Ok(tables.event_keys.get(key).copied())
    }

    async fn insert_game_odds(&mut self, key: &GameOddsKey) -> SinkResult<Option<Identity>> {
        let (tables, journal) = self.write()?;
        let target_exists = match key.target {
            OddsTarget::Game(id) => tables.games.contains_key(&id),
            OddsTarget::Event(id) => tables.events.contains_key(&id),
        };
        if !target_exists {
            return Err(SinkError::Rejected(format!(
                "insert on game_odds violates foreign key ({:?})",
                key.target
            )));
        }
        if tables.game_odds.contains_key(key) {
            return Ok(None);
        }

        let id = tables.next_id();
        tables.game_odds.insert(key.clone(), id);
        tables.game_odds_ids.insert(id);
        journal.push(Undo::GameOdds(key.clone(), id));
        Ok(Some(id))
    }

    async fn find_game_odds(&mut self, key: &GameOddsKey) -> SinkResult<Option<Identity>> {
        let tables = self.read()?;
        Ok(tables.game_odds.get(key).copied())
    }

    async fn insert_odds(&mut self, row: &OddsRow) -> SinkResult<Option<Identity>> {
        let (tables, journal) = self.write()?;
        if !tables.game_odds_ids.contains(&row.game_odds_id) {
            return Err(SinkError::Rejected(format!(
                "insert on odds violates foreign key (game_odds {})",
                row.game_odds_id
            )));
        }

        let key = (row.game_odds_id, row.line.outcome_type.clone());
        if tables.odds.contains_key(&key) {
            return Ok(None);
        }

        let id = tables.next_id();
        tables.odds.insert(key, (id, row.clone()));
        journal.push(Undo::Odds(row.game_odds_id, row.line.outcome_type.clone()));
        Ok(Some(id))
    }

    async fn count(&mut self, table: Table) -> SinkResult<i64> {
        self.check_connection()?;
        Ok(self.rows(table))
    }
}
