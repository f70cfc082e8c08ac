//! Relational sink seam.
//!
//! The loader speaks to the sink in terms of its own rows. Each implementation
//! enforces the same unique keys and the same write-once / overwrite column split:
//! [`PgSink`] through SQL constraints, [`MemorySink`] in process for dry runs and tests.

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::model::{EntityKind, EntityRef, EventKey, EventRow, GameOddsKey, GameRow, Identity, OddsRow};

pub use memory::MemorySink;
pub use postgres::PgSink;

pub type SinkResult<T> = Result<T, SinkError>;

/// Tables produced by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Sports,
    Seasons,
    Teams,
    Venues,
    Books,
    WagerTypes,
    Participants,
    Players,
    Games,
    Events,
    GameOdds,
    Odds,
}

impl Table {
    pub const ALL: [Table; 12] = [
        Table::Sports,
        Table::Seasons,
        Table::Teams,
        Table::Venues,
        Table::Books,
        Table::WagerTypes,
        Table::Participants,
        Table::Players,
        Table::Games,
        Table::Events,
        Table::GameOdds,
        Table::Odds,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Sports => "sports",
            Table::Seasons => "seasons",
            Table::Teams => "teams",
            Table::Venues => "venues",
            Table::Books => "books",
            Table::WagerTypes => "wager_types",
            Table::Participants => "participants",
            Table::Players => "players",
            Table::Games => "games",
            Table::Events => "events",
            Table::GameOdds => "game_odds",
            Table::Odds => "odds",
        }
    }

    pub fn for_kind(kind: EntityKind) -> Table {
        match kind {
            EntityKind::Sport => Table::Sports,
            EntityKind::Season => Table::Seasons,
            EntityKind::Team => Table::Teams,
            EntityKind::Venue => Table::Venues,
            EntityKind::Book => Table::Books,
            EntityKind::WagerType => Table::WagerTypes,
            EntityKind::Participant => Table::Participants,
            EntityKind::Player => Table::Players,
            EntityKind::Game => Table::Games,
            EntityKind::Event => Table::Events,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[async_trait]
pub trait Sink: Send {
    async fn begin(&mut self) -> SinkResult<()>;
    async fn commit(&mut self) -> SinkResult<()>;
    async fn rollback(&mut self) -> SinkResult<()>;

    /// Mark the start of one record inside the open transaction.
    async fn savepoint(&mut self) -> SinkResult<()>;
    async fn release_savepoint(&mut self) -> SinkResult<()>;
    /// Undo everything written since the last `savepoint`.
    async fn rollback_to_savepoint(&mut self) -> SinkResult<()>;

    /// All (natural key, identity) pairs of one kind, for cache preload.
    ///
    /// Games are keyed by their feed id, events by [`EventKey::cache_key`].
    async fn load_keys(&mut self, kind: EntityKind) -> SinkResult<Vec<(String, Identity)>>;

    /// Insert a reference entity unless its natural key exists.
    ///
    /// Returns `None` on a natural-key conflict; the caller re-reads the identity.
    async fn insert_entity(&mut self, entity: &EntityRef) -> SinkResult<Option<Identity>>;

    async fn find_entity(
        &mut self,
        kind: EntityKind,
        natural_key: &str,
    ) -> SinkResult<Option<Identity>>;

    /// Insert a game, or overwrite only its mutable state if it exists.
    async fn upsert_game(&mut self, game: &GameRow) -> SinkResult<Identity>;

    async fn find_game(&mut self, id: i64) -> SinkResult<Option<Identity>>;

    /// Insert an event unless its key exists; a missing external id is back-filled.
    async fn upsert_event(&mut self, event: &EventRow) -> SinkResult<Identity>;

    async fn find_event(&mut self, key: &EventKey) -> SinkResult<Option<Identity>>;

    /// Insert a game-odds header. `None` means the observation is already recorded.
    async fn insert_game_odds(&mut self, key: &GameOddsKey) -> SinkResult<Option<Identity>>;

    async fn find_game_odds(&mut self, key: &GameOddsKey) -> SinkResult<Option<Identity>>;

    /// Insert one outcome. `None` means the header already has this outcome.
    async fn insert_odds(&mut self, row: &OddsRow) -> SinkResult<Option<Identity>>;

    async fn count(&mut self, table: Table) -> SinkResult<i64>;
}
