//! Fact rows: games, events, game-odds headers and their outcomes.
//!
//! Games and events are upserted (mutable columns overwritten, identity columns
//! write-once). Headers and outcomes are insert-only.

use tracing::{debug, warn};

use crate::error::LoadError;
use crate::model::{
    EntityKind, EntityRef, EventRow, GameOddsKey, GameRow, Identity, OddsRow, OddsTarget,
    PlayerAttributes,
};
use crate::resolver::IdentityResolver;
use crate::sink::Sink;
use crate::walker::{EventRecord, GameRecord, NormalizedRecord, PlayerRecord, QuoteRecord, QuoteTarget};

pub async fn write_game<S>(sink: &mut S, row: &GameRow) -> Result<Identity, LoadError>
where
    S: Sink + ?Sized,
{
    sink.upsert_game(row)
        .await
        .map_err(|e| LoadError::writing(format!("game {}", row.id), e))
}

pub async fn write_event<S>(sink: &mut S, row: &EventRow) -> Result<Identity, LoadError>
where
    S: Sink + ?Sized,
{
    sink.upsert_event(row)
        .await
        .map_err(|e| LoadError::writing(format!("event {}", row.event_name), e))
}

/// Insert a header, or reuse the one already recorded for this observation.
///
/// Returns the header identity and whether this call created it.
pub async fn write_game_odds<S>(sink: &mut S, key: &GameOddsKey) -> Result<(Identity, bool), LoadError>
where
    S: Sink + ?Sized,
{
    let what = || format!("game odds {:?} at {}", key.target, key.as_of_time.to_rfc3339());
    if let Some(id) = sink
        .insert_game_odds(key)
        .await
        .map_err(|e| LoadError::writing(what(), e))?
    {
        return Ok((id, true));
    }

    let existing = sink
        .find_game_odds(key)
        .await
        .map_err(|e| LoadError::writing(what(), e))?;
    existing
        .map(|id| (id, false))
        .ok_or_else(|| LoadError::WriteRejected {
            what: what(),
            reason: "insert conflicted but no header holds the key".to_string(),
        })
}

/// Insert one outcome. A second outcome of the same type under one header is a
/// `DuplicateFact`.
pub async fn write_odds<S>(sink: &mut S, row: &OddsRow) -> Result<Identity, LoadError>
where
    S: Sink + ?Sized,
{
    let inserted = sink.insert_odds(row).await.map_err(|e| {
        LoadError::writing(
            format!("{} outcome for game odds {}", row.line.outcome_type, row.game_odds_id),
            e,
        )
    })?;
    inserted.ok_or_else(|| LoadError::DuplicateFact {
        game_odds_id: row.game_odds_id,
        outcome: row.line.outcome_type.to_string(),
    })
}

/// What one record added to the sink.
#[derive(Debug, Default, PartialEq)]
pub struct Written {
    pub outcomes_written: usize,
    /// Outcomes already present under a header recorded by an earlier run.
    pub outcomes_existing: usize,
    /// Outcomes dropped because their new header already had that outcome.
    pub duplicates: Vec<LoadError>,
}

/// Resolve a record's references and write its facts.
pub async fn write_record<S>(
    sink: &mut S,
    resolver: &mut IdentityResolver,
    record: &NormalizedRecord,
) -> Result<Written, LoadError>
where
    S: Sink + ?Sized,
{
    match record {
        NormalizedRecord::Game(game) => {
            game_facts(sink, resolver, game).await?;
            Ok(Written::default())
        }
        NormalizedRecord::Event(event) => {
            event_facts(sink, resolver, event).await?;
            Ok(Written::default())
        }
        NormalizedRecord::Quote(quote) => quote_facts(sink, resolver, quote).await,
        NormalizedRecord::Player(player) => {
            player_facts(sink, resolver, player).await?;
            Ok(Written::default())
        }
    }
}

async fn resolve_optional<S>(
    sink: &mut S,
    resolver: &mut IdentityResolver,
    entity: Option<&EntityRef>,
) -> Result<Option<Identity>, LoadError>
where
    S: Sink + ?Sized,
{
    match entity {
        Some(entity) => Ok(Some(resolver.resolve(sink, entity).await?)),
        None => Ok(None),
    }
}

async fn game_facts<S>(
    sink: &mut S,
    resolver: &mut IdentityResolver,
    game: &GameRecord,
) -> Result<Identity, LoadError>
where
    S: Sink + ?Sized,
{
    let season_id = resolve_optional(sink, resolver, game.season.as_ref()).await?;
    let away_team_id = resolver.resolve(sink, &game.away_team).await?;
    let home_team_id = resolver.resolve(sink, &game.home_team).await?;
    let venue_id = resolve_optional(sink, resolver, game.venue.as_ref()).await?;

    let row = GameRow {
        id: game.id,
        season_id,
        week: game.week,
        start_time: game.start_time,
        away_team_id,
        home_team_id,
        venue_id,
        venue_allegiance: game.venue_allegiance.clone(),
        state: game.state.clone(),
    };
    let id = write_game(sink, &row).await?;
    resolver.record(EntityKind::Game, &id.to_string(), id);
    debug!(game = id, home = home_team_id, away = away_team_id, "wrote game");
    Ok(id)
}

async fn event_facts<S>(
    sink: &mut S,
    resolver: &mut IdentityResolver,
    event: &EventRecord,
) -> Result<Identity, LoadError>
where
    S: Sink + ?Sized,
{
    let sport_id = resolver.resolve(sink, &event.event.sport).await?;
    let key = resolver.event_key(sink, &event.event, sport_id).await?;
    let row = EventRow {
        key,
        external_id: event.external_id.clone(),
        event_name: event.event_name.clone(),
        sport_id,
    };
    let id = write_event(sink, &row).await?;
    resolver.record(EntityKind::Event, &key.cache_key(), id);
    debug!(event = id, name = %event.event_name, "wrote event");
    Ok(id)
}

async fn quote_facts<S>(
    sink: &mut S,
    resolver: &mut IdentityResolver,
    quote: &QuoteRecord,
) -> Result<Written, LoadError>
where
    S: Sink + ?Sized,
{
    let target = match &quote.target {
        QuoteTarget::Game(game_id) => OddsTarget::Game(resolver.resolve_game(sink, *game_id).await?),
        QuoteTarget::Event(event) => {
            let sport_id = resolver.resolve(sink, &event.sport).await?;
            let key = resolver.event_key(sink, event, sport_id).await?;
            OddsTarget::Event(resolver.resolve_event(sink, &key).await?)
        }
    };
    let book_id = resolver.resolve(sink, &quote.book).await?;
    let wager_type_id = resolver.resolve(sink, &quote.wager_type).await?;

    let key = GameOddsKey {
        target,
        book_id,
        as_of_time: quote.as_of_time,
        segment: quote.segment.clone(),
        wager_type_id,
    };
    let (game_odds_id, created) = write_game_odds(sink, &key).await?;

    let mut written = Written::default();
    for line in &quote.outcomes {
        let row = OddsRow {
            game_odds_id,
            line: line.clone(),
        };
        match write_odds(sink, &row).await {
            Ok(_) => written.outcomes_written += 1,
            Err(LoadError::DuplicateFact { .. }) if !created => written.outcomes_existing += 1,
            Err(err @ LoadError::DuplicateFact { .. }) => {
                warn!(error = %err, "dropping duplicate outcome");
                written.duplicates.push(err);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(written)
}

async fn player_facts<S>(
    sink: &mut S,
    resolver: &mut IdentityResolver,
    player: &PlayerRecord,
) -> Result<Identity, LoadError>
where
    S: Sink + ?Sized,
{
    let team_id = resolve_optional(sink, resolver, player.team.as_ref()).await?;
    let attributes = PlayerAttributes {
        team_id,
        ..player.attributes.clone()
    };
    resolver
        .resolve(sink, &EntityRef::player(player.source_id, attributes))
        .await
}
