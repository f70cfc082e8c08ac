//! Decomposes raw documents into normalized records.
//!
//! Walking never writes and never touches the sink, so the same document can be
//! walked again at any time. Records come out in a fixed order:
//!
//! - schedules: game by game
//! - game lines: game, then book, then moneylines, point spreads, over/unders
//! - event snapshots: the event itself, then bookmaker by bookmaker, market by market
//! - rosters: player by player
//!
//! A subtree missing an identifying field becomes one `MalformedRecord` item and
//! the walk moves on to its next sibling.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::LoadError;
use crate::model::events::{market_kind, split_market_key, EventSnapshot, MarketKind, OddsApiEvent};
use crate::model::lines::{GameLines, LinePrice, OddsDocument, WagerLine};
use crate::model::roster::{RosterDocument, RosterPlayer};
use crate::model::season::{ScheduledGame, SeasonDocument, TeamRef, WeatherReport};
use crate::model::{
    EntityRef, GameState, OutcomeLine, OutcomeType, PlayerAttributes, Price, SeasonType, Segment,
    Weather,
};
use crate::source::{Document, DocumentKind};

pub type WalkItem = Result<NormalizedRecord, LoadError>;
pub type Records = Box<dyn Iterator<Item = WalkItem> + Send>;

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedRecord {
    Game(GameRecord),
    Quote(QuoteRecord),
    Event(EventRecord),
    Player(PlayerRecord),
}

impl NormalizedRecord {
    /// Short human description for logs and failure summaries.
    pub fn describe(&self) -> String {
        match self {
            NormalizedRecord::Game(game) => format!("game {}", game.id),
            NormalizedRecord::Quote(quote) => {
                let target = match &quote.target {
                    QuoteTarget::Game(id) => format!("game {}", id),
                    QuoteTarget::Event(event) => event.describe(),
                };
                format!(
                    "{} {} quote from {} at {} for {}",
                    quote.segment,
                    quote.wager_type.natural_key,
                    quote.book.natural_key,
                    quote.as_of_time.to_rfc3339(),
                    target
                )
            }
            NormalizedRecord::Event(event) => event.event.describe(),
            NormalizedRecord::Player(player) => format!("player {}", player.source_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    pub id: i64,
    pub season: Option<EntityRef>,
    pub week: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub away_team: EntityRef,
    pub home_team: EntityRef,
    pub venue: Option<EntityRef>,
    pub venue_allegiance: Option<String>,
    pub state: GameState,
}

/// An event identified by its participants and start, as feeds without game ids send it.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRef {
    pub sport: EntityRef,
    pub home: EntityRef,
    pub away: EntityRef,
    pub commence_time: DateTime<Utc>,
}

impl EventRef {
    fn describe(&self) -> String {
        format!(
            "event {} vs {} at {}",
            self.home.natural_key,
            self.away.natural_key,
            self.commence_time.to_rfc3339()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub event: EventRef,
    pub external_id: Option<String>,
    pub event_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuoteTarget {
    Game(i64),
    Event(EventRef),
}

/// One game-odds header observation and the outcomes that carried a price.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRecord {
    pub target: QuoteTarget,
    pub book: EntityRef,
    pub wager_type: EntityRef,
    pub as_of_time: DateTime<Utc>,
    pub segment: String,
    pub outcomes: Vec<OutcomeLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub source_id: i64,
    pub team: Option<EntityRef>,
    pub attributes: PlayerAttributes,
}

/// Walk one document. Items are produced lazily, one game (or event) subtree at a time.
pub fn walk(document: &Document) -> Records {
    let origin = document.origin.clone();
    let body = document.body.clone();
    match document.kind {
        DocumentKind::Season => match serde_json::from_value::<SeasonDocument>(body) {
            Ok(doc) => walk_season(doc, origin),
            Err(e) => malformed_document(origin, e.to_string()),
        },
        DocumentKind::Odds => match serde_json::from_value::<OddsDocument>(body) {
            Ok(doc) => walk_odds(doc, origin),
            Err(e) => malformed_document(origin, e.to_string()),
        },
        DocumentKind::Events => match EventSnapshot::from_value(body) {
            Ok(snapshot) => walk_events(snapshot, origin),
            Err(e) => malformed_document(origin, e.to_string()),
        },
        DocumentKind::Roster => match serde_json::from_value::<RosterDocument>(body) {
            Ok(doc) => walk_roster(doc, origin),
            Err(e) => malformed_document(origin, e.to_string()),
        },
    }
}

fn malformed(context: &str, reason: impl Into<String>) -> LoadError {
    let err = LoadError::malformed(context, reason);
    warn!(error = %err, "skipping malformed subtree");
    err
}

fn malformed_document(origin: String, reason: String) -> Records {
    Box::new(std::iter::once(Err(malformed(&origin, reason))))
}

fn non_empty(s: &&str) -> bool {
    !s.trim().is_empty()
}

// ---------------------------------------------------------------------------
// Season schedules
// ---------------------------------------------------------------------------

fn walk_season(doc: SeasonDocument, origin: String) -> Records {
    let season = match season_ref(doc.season, doc.season_type.as_deref()) {
        Ok(season) => season,
        Err(reason) => return malformed_document(origin, reason),
    };

    Box::new(
        doc.response
            .games
            .into_iter()
            .enumerate()
            .map(move |(i, game)| {
                let context = format!("{} game #{}", origin, i);
                let game = game.0.map_err(|reason| malformed(&context, reason))?;
                game_record(game, season.clone(), &context).map(NormalizedRecord::Game)
            }),
    )
}

/// A season needs both its year and its type; either missing leaves games season-less.
fn season_ref(year: Option<i64>, season_type: Option<&str>) -> Result<Option<EntityRef>, String> {
    match (year, season_type) {
        (Some(year), Some(season_type)) => {
            let year =
                i32::try_from(year).map_err(|_| format!("season year {} out of range", year))?;
            let season_type = season_type.parse::<SeasonType>()?;
            Ok(Some(EntityRef::season(year, season_type)))
        }
        _ => Ok(None),
    }
}

fn team_ref(team: Option<&TeamRef>, side: &str, context: &str) -> Result<EntityRef, LoadError> {
    team.and_then(|t| {
        t.abbreviation
            .as_deref()
            .filter(non_empty)
            .map(|abbreviation| EntityRef::team(abbreviation, t.id))
    })
    .ok_or_else(|| malformed(context, format!("missing {} team abbreviation", side)))
}

fn game_record(
    game: ScheduledGame,
    season: Option<EntityRef>,
    context: &str,
) -> Result<GameRecord, LoadError> {
    let schedule = game
        .schedule
        .ok_or_else(|| malformed(context, "missing schedule"))?;
    let id = schedule
        .id
        .ok_or_else(|| malformed(context, "missing game id"))?;
    let context = format!("{} (game {})", context, id);

    let away_team = team_ref(schedule.away_team.as_ref(), "away", &context)?;
    let home_team = team_ref(schedule.home_team.as_ref(), "home", &context)?;
    if away_team.natural_key == home_team.natural_key {
        return Err(malformed(
            &context,
            format!("home and away are both {}", home_team.natural_key),
        ));
    }

    let venue = schedule.venue.as_ref().and_then(|v| {
        v.name
            .as_deref()
            .filter(non_empty)
            .map(|name| EntityRef::venue(name, v.id, v.city.clone()))
    });
    let score = game.score.unwrap_or_default();

    Ok(GameRecord {
        id,
        season,
        week: schedule.week,
        start_time: schedule.start_time,
        away_team,
        home_team,
        venue,
        venue_allegiance: schedule.venue_allegiance,
        state: GameState {
            ended_time: schedule.ended_time,
            schedule_status: schedule.schedule_status,
            played_status: schedule.played_status,
            attendance: schedule.attendance,
            weather: weather(schedule.weather),
            away_score_total: score.away_score_total,
            home_score_total: score.home_score_total,
        },
    })
}

fn weather(report: Option<WeatherReport>) -> Weather {
    let Some(report) = report else {
        return Weather::default();
    };
    let wind = report.wind.unwrap_or_default();
    let speed = wind.speed.unwrap_or_default();
    let direction = wind.direction.unwrap_or_default();
    let temperature = report.temperature.unwrap_or_default();

    Weather {
        weather_type: report.weather_type,
        description: report.description,
        wind_speed_mph: speed.miles_per_hour,
        wind_speed_kph: speed.kilometers_per_hour,
        wind_direction_degrees: direction.degrees,
        wind_direction_label: direction.label,
        temperature_f: temperature.fahrenheit,
        temperature_c: temperature.celsius,
        humidity_percent: report.humidity_percent,
    }
}

// ---------------------------------------------------------------------------
// Game lines
// ---------------------------------------------------------------------------

fn walk_odds(doc: OddsDocument, origin: String) -> Records {
    Box::new(
        doc.response
            .game_lines
            .into_iter()
            .enumerate()
            .flat_map(move |(i, game_lines)| {
                let context = format!("{} gameLines #{}", origin, i);
                match game_lines.0 {
                    Ok(game_lines) => game_quotes(game_lines, &context),
                    Err(reason) => vec![Err(malformed(&context, reason))],
                }
            }),
    )
}

fn game_quotes(game_lines: GameLines, context: &str) -> Vec<WalkItem> {
    let Some(game_id) = game_lines.game.as_ref().and_then(|g| g.id) else {
        return vec![Err(malformed(context, "missing game id"))];
    };

    let mut records = Vec::new();
    for (i, line) in game_lines.lines.iter().enumerate() {
        let context = format!("{} (game {}) line #{}", context, game_id, i);
        let line = match line.parsed() {
            Ok(line) => line,
            Err(reason) => {
                records.push(Err(malformed(&context, reason)));
                continue;
            }
        };
        let Some((source, name)) = line
            .source
            .as_ref()
            .and_then(|s| s.name.as_deref().filter(non_empty).map(|name| (s, name)))
        else {
            records.push(Err(malformed(&context, "missing book name")));
            continue;
        };
        let book = EntityRef::book(
            name,
            source.region.clone(),
            source.is_online_sportsbook,
            source.is_las_vegas,
        );

        for entry in line.wagers() {
            match entry {
                Err(reason) => records.push(Err(malformed(&context, reason))),
                // A group entry without its body carries nothing to record.
                Ok((_, None)) => {}
                Ok((None, Some(wager))) => records.push(Err(malformed(
                    &format!("{} {}", context, wager.key()),
                    "missing asOfTime",
                ))),
                // Every price null still records the observation, with no outcomes.
                Ok((Some(as_of_time), Some(wager))) => {
                    records.push(Ok(NormalizedRecord::Quote(QuoteRecord {
                        target: QuoteTarget::Game(game_id),
                        book: book.clone(),
                        wager_type: EntityRef::wager_type(wager.key()),
                        as_of_time,
                        segment: segment_name(wager.game_segment()),
                        outcomes: wager_outcomes(wager),
                    })));
                }
            }
        }
    }
    records
}

fn segment_name(raw: Option<&str>) -> String {
    raw.filter(non_empty)
        .map(|s| s.trim().to_ascii_uppercase())
        .unwrap_or_else(|| Segment::Full.as_str().to_string())
}

/// Outcomes in fixed order, keeping only those whose American price is present.
fn wager_outcomes(wager: WagerLine<'_>) -> Vec<OutcomeLine> {
    let candidates = match wager {
        WagerLine::MoneyLine(ml) => vec![
            (OutcomeType::Away, ml.away_line.as_ref(), None, None),
            (OutcomeType::Home, ml.home_line.as_ref(), None, None),
            (OutcomeType::Draw, ml.draw_line.as_ref(), None, None),
        ],
        WagerLine::PointSpread(ps) => vec![
            (OutcomeType::Away, ps.away_line.as_ref(), ps.away_spread, None),
            (OutcomeType::Home, ps.home_line.as_ref(), ps.home_spread, None),
        ],
        WagerLine::OverUnder(ou) => vec![
            (OutcomeType::Over, ou.over_line.as_ref(), None, ou.over_under),
            (OutcomeType::Under, ou.under_line.as_ref(), None, ou.over_under),
        ],
    };

    candidates
        .into_iter()
        .filter_map(|(outcome_type, price, spread, total)| {
            line_outcome(outcome_type, price?, spread, total)
        })
        .collect()
}

fn line_outcome(
    outcome_type: OutcomeType,
    price: &LinePrice,
    spread: Option<f64>,
    total: Option<f64>,
) -> Option<OutcomeLine> {
    let american = i32::try_from(price.american?).ok()?;
    Some(OutcomeLine {
        outcome_type,
        price: Price {
            american: Some(american),
            decimal: price.decimal,
            fractional: price.fractional.clone(),
        },
        spread,
        total,
    })
}

// ---------------------------------------------------------------------------
// Event snapshots
// ---------------------------------------------------------------------------

fn walk_events(snapshot: EventSnapshot, origin: String) -> Records {
    let timestamp = snapshot.timestamp;
    Box::new(
        snapshot
            .events
            .into_iter()
            .enumerate()
            .flat_map(move |(i, event)| {
                let context = format!("{} event #{}", origin, i);
                match event.0 {
                    Ok(event) => event_records(event, timestamp, &context),
                    Err(reason) => vec![Err(malformed(&context, reason))],
                }
            }),
    )
}

fn event_records(
    event: OddsApiEvent,
    timestamp: Option<DateTime<Utc>>,
    context: &str,
) -> Vec<WalkItem> {
    let Some(commence_time) = event.commence_time else {
        return vec![Err(malformed(context, "missing commence_time"))];
    };
    if event.sport_key.trim().is_empty() {
        return vec![Err(malformed(context, "missing sport_key"))];
    }
    if event.home_team.trim().is_empty() || event.away_team.trim().is_empty() {
        return vec![Err(malformed(context, "missing home_team or away_team"))];
    }

    let home = EntityRef::participant(&event.sport_key, &event.home_team);
    let away = EntityRef::participant(&event.sport_key, &event.away_team);
    if home.natural_key == away.natural_key {
        return vec![Err(malformed(
            context,
            format!("home and away are both {}", event.home_team),
        ))];
    }

    let sport_title = event.sport_title.trim();
    let event_ref = EventRef {
        sport: EntityRef::sport(&event.sport_key, Some(sport_title).filter(non_empty)),
        home,
        away,
        commence_time,
    };
    let mut records = vec![Ok(NormalizedRecord::Event(EventRecord {
        event: event_ref.clone(),
        external_id: event.id.clone().filter(|id| !id.trim().is_empty()),
        event_name: format!("{} vs {}", event.home_team.trim(), event.away_team.trim()),
    }))];

    for (i, bookmaker) in event.bookmakers.iter().enumerate() {
        let context = format!("{} bookmaker #{}", context, i);
        let bookmaker = match bookmaker.parsed() {
            Ok(bookmaker) => bookmaker,
            Err(reason) => {
                records.push(Err(malformed(&context, reason)));
                continue;
            }
        };
        // Titles match the book names the schedule feed uses; keys are the fallback.
        let Some(name) = [bookmaker.title.as_str(), bookmaker.key.as_str()]
            .into_iter()
            .find(non_empty)
        else {
            records.push(Err(malformed(&context, "missing bookmaker title")));
            continue;
        };
        let book = EntityRef::book(name, None, None, None);

        for (j, market) in bookmaker.markets.iter().enumerate() {
            let context = format!("{} market #{}", context, j);
            let market = match market.parsed() {
                Ok(market) => market,
                Err(reason) => {
                    records.push(Err(malformed(&context, reason)));
                    continue;
                }
            };
            if market.key.trim().is_empty() {
                records.push(Err(malformed(&context, "missing market key")));
                continue;
            }
            let Some(as_of_time) = market
                .last_update
                .or(bookmaker.last_update)
                .or(timestamp)
            else {
                records.push(Err(malformed(&context, "no last_update or snapshot timestamp")));
                continue;
            };

            let (base, segment) = split_market_key(market.key.trim());
            let kind = market_kind(base);
            let outcomes: Vec<OutcomeLine> = market
                .outcomes
                .iter()
                .filter_map(|outcome| {
                    let price = outcome.price?;
                    let (spread, total) = match kind {
                        MarketKind::HeadToHead => (None, None),
                        MarketKind::Spreads => (outcome.point, None),
                        MarketKind::Totals | MarketKind::Other => (None, outcome.point),
                    };
                    Some(OutcomeLine {
                        outcome_type: outcome_type(&outcome.name, &event),
                        price: Price::from_feed(price),
                        spread,
                        total,
                    })
                })
                .collect();

            records.push(Ok(NormalizedRecord::Quote(QuoteRecord {
                target: QuoteTarget::Event(event_ref.clone()),
                book: book.clone(),
                wager_type: EntityRef::wager_type(base),
                as_of_time,
                segment: segment.as_str().to_string(),
                outcomes,
            })));
        }
    }
    records
}

fn outcome_type(name: &str, event: &OddsApiEvent) -> OutcomeType {
    let name = name.trim();
    if name == event.home_team.trim() {
        OutcomeType::Home
    } else if name == event.away_team.trim() {
        OutcomeType::Away
    } else if name.eq_ignore_ascii_case("over") {
        OutcomeType::Over
    } else if name.eq_ignore_ascii_case("under") {
        OutcomeType::Under
    } else if name.eq_ignore_ascii_case("draw") {
        OutcomeType::Draw
    } else {
        OutcomeType::Named(name.to_string())
    }
}

// ---------------------------------------------------------------------------
// Rosters
// ---------------------------------------------------------------------------

fn walk_roster(doc: RosterDocument, origin: String) -> Records {
    Box::new(doc.players.into_iter().enumerate().map(move |(i, player)| {
        let context = format!("{} player #{}", origin, i);
        let player = player.0.map_err(|reason| malformed(&context, reason))?;
        player_record(player, &context).map(NormalizedRecord::Player)
    }))
}

fn player_record(player: RosterPlayer, context: &str) -> Result<PlayerRecord, LoadError> {
    let source_id = player
        .id
        .ok_or_else(|| malformed(context, "missing player id"))?;
    let team = player.current_team.as_ref().and_then(|t| {
        t.abbreviation
            .as_deref()
            .filter(non_empty)
            .map(|abbreviation| EntityRef::team(abbreviation, t.id))
    });

    Ok(PlayerRecord {
        source_id,
        team,
        attributes: PlayerAttributes {
            first_name: player.first_name,
            last_name: player.last_name,
            position: player.primary_position,
            jersey_number: player.jersey_number,
            height: player.height,
            weight: player.weight,
            birth_date: player.birth_date,
            college: player.college,
            team_id: None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;
    use serde_json::json;

    fn records(document: &Document) -> Vec<WalkItem> {
        walk(document).collect()
    }

    #[test]
    fn season_games_carry_their_references() {
        let doc = testkit::season_document(
            2023,
            "REG",
            vec![testkit::game(10, "BUF", "KC", Some("Arrowhead Stadium"))],
        );
        let items = records(&doc);
        assert_eq!(items.len(), 1);

        let NormalizedRecord::Game(game) = items[0].as_ref().unwrap() else {
            panic!("expected a game record");
        };
        assert_eq!(game.id, 10);
        assert_eq!(game.away_team.natural_key, "BUF");
        assert_eq!(game.home_team.natural_key, "KC");
        assert_eq!(game.season.as_ref().unwrap().natural_key, "2023-regular");
        assert_eq!(game.venue.as_ref().unwrap().natural_key, "Arrowhead Stadium");
        assert_eq!(game.state.attendance, Some(70000));
    }

    #[test]
    fn a_game_without_id_is_skipped_alone() {
        let mut bad = testkit::game(11, "NYJ", "NE", None);
        bad["schedule"]["id"] = json!(null);
        let doc = testkit::season_document(
            2023,
            "REG",
            vec![testkit::game(10, "BUF", "KC", None), bad],
        );
        let items = records(&doc);
        assert!(items[0].is_ok());
        assert!(matches!(
            items[1],
            Err(LoadError::MalformedRecord { ref reason, .. }) if reason == "missing game id"
        ));
    }

    #[test]
    fn optional_fields_pass_through_as_null() {
        let mut game = testkit::game(10, "BUF", "KC", None);
        game["schedule"]
            .as_object_mut()
            .unwrap()
            .remove("weather");
        game["schedule"]
            .as_object_mut()
            .unwrap()
            .remove("venueAllegiance");
        let doc = testkit::season_document(2023, "REG", vec![game]);
        let NormalizedRecord::Game(game) = records(&doc).remove(0).unwrap() else {
            panic!("expected a game record");
        };
        assert_eq!(game.venue_allegiance, None);
        assert_eq!(game.state.weather, Weather::default());
    }

    #[test]
    fn null_prices_produce_no_outcome() {
        let doc = testkit::odds_document(vec![testkit::game_lines(
            10,
            "FanDuel",
            vec![testkit::moneyline("2023-09-07T12:00:00Z", Some(130), Some(-150), None)],
        )]);
        let items = records(&doc);
        assert_eq!(items.len(), 1);

        let NormalizedRecord::Quote(quote) = items[0].as_ref().unwrap() else {
            panic!("expected a quote record");
        };
        assert_eq!(quote.segment, "FULL");
        assert_eq!(quote.wager_type.natural_key, "moneyline");
        let outcomes: Vec<&OutcomeType> = quote.outcomes.iter().map(|o| &o.outcome_type).collect();
        assert_eq!(outcomes, vec![&OutcomeType::Away, &OutcomeType::Home]);
        assert_eq!(quote.outcomes[1].price.american, Some(-150));
    }

    #[test]
    fn wager_groups_follow_fixed_order_and_absent_groups_are_skipped() {
        let mut lines = testkit::game_lines(
            10,
            "DraftKings",
            vec![testkit::moneyline("2023-09-07T12:00:00Z", Some(130), Some(-150), None)],
        );
        lines["lines"][0]["overUnders"] = json!([{
            "asOfTime": "2023-09-07T12:00:00Z",
            "overUnder": {"overUnder": 47.5, "overLine": {"american": -110}, "underLine": {"american": -110}}
        }]);
        let doc = testkit::odds_document(vec![lines]);

        let keys: Vec<String> = records(&doc)
            .into_iter()
            .map(|item| match item.unwrap() {
                NormalizedRecord::Quote(q) => q.wager_type.natural_key,
                other => panic!("unexpected record {:?}", other),
            })
            .collect();
        assert_eq!(keys, vec!["moneyline", "over_under"]);
    }

    #[test]
    fn null_group_beside_a_valid_one_is_skipped() {
        let mut lines = testkit::game_lines(
            10,
            "FanDuel",
            vec![testkit::moneyline("2023-09-07T12:00:00Z", Some(130), Some(-150), None)],
        );
        lines["lines"][0]["pointSpreads"] = json!(null);
        lines["lines"][0]["overUnders"] = json!(null);
        let doc = testkit::odds_document(vec![lines]);

        let items = records(&doc);
        assert_eq!(items.len(), 1);
        let NormalizedRecord::Quote(quote) = items[0].as_ref().unwrap() else {
            panic!("expected a quote record");
        };
        assert_eq!(quote.wager_type.natural_key, "moneyline");
        assert_eq!(quote.outcomes.len(), 2);
    }

    #[test]
    fn entry_with_every_price_null_still_yields_a_quote() {
        let doc = testkit::odds_document(vec![testkit::game_lines(
            10,
            "FanDuel",
            vec![testkit::moneyline("2023-09-07T12:00:00Z", None, None, None)],
        )]);
        let items = records(&doc);
        assert_eq!(items.len(), 1);

        let NormalizedRecord::Quote(quote) = items[0].as_ref().unwrap() else {
            panic!("expected a quote record");
        };
        assert_eq!(quote.book.natural_key, "FanDuel");
        assert!(quote.outcomes.is_empty());
    }

    #[test]
    fn wager_entry_without_timestamp_is_malformed() {
        let doc = testkit::odds_document(vec![testkit::game_lines(
            10,
            "FanDuel",
            vec![json!({"moneyLine": {"homeLine": {"american": -150}}})],
        )]);
        let items = records(&doc);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap_err().label(), "malformed_record");
    }

    #[test]
    fn event_markets_split_into_type_and_segment() {
        let doc = Document::new(
            DocumentKind::Events,
            "events/a.json",
            json!({
                "timestamp": "2024-10-04T12:00:00Z",
                "data": [{
                    "id": "abc",
                    "sport_key": "americanfootball_nfl",
                    "commence_time": "2024-10-06T17:00:00Z",
                    "home_team": "Chicago Bears",
                    "away_team": "Carolina Panthers",
                    "bookmakers": [{
                        "key": "fanduel",
                        "title": "FanDuel",
                        "markets": [
                            {"key": "spreads_h1", "last_update": "2024-10-04T11:59:00Z", "outcomes": [
                                {"name": "Chicago Bears", "price": -110, "point": -2.5},
                                {"name": "Carolina Panthers", "price": null, "point": 2.5}
                            ]},
                            {"key": "totals", "outcomes": [
                                {"name": "Over", "price": 1.91, "point": 44.5}
                            ]}
                        ]
                    }]
                }]
            }),
        );
        let items: Vec<NormalizedRecord> = records(&doc).into_iter().map(Result::unwrap).collect();
        assert_eq!(items.len(), 3);
        assert!(matches!(&items[0], NormalizedRecord::Event(e) if e.event_name == "Chicago Bears vs Carolina Panthers"));

        let NormalizedRecord::Quote(spreads) = &items[1] else {
            panic!("expected a quote");
        };
        assert_eq!(spreads.wager_type.natural_key, "spreads");
        assert_eq!(spreads.segment, "FIRST_HALF");
        assert_eq!(spreads.outcomes.len(), 1);
        assert_eq!(spreads.outcomes[0].outcome_type, OutcomeType::Home);
        assert_eq!(spreads.outcomes[0].spread, Some(-2.5));

        let NormalizedRecord::Quote(totals) = &items[2] else {
            panic!("expected a quote");
        };
        // Falls back to the snapshot timestamp.
        assert_eq!(totals.as_of_time.to_rfc3339(), "2024-10-04T12:00:00+00:00");
        assert_eq!(totals.outcomes[0].outcome_type, OutcomeType::Over);
        assert_eq!(totals.outcomes[0].total, Some(44.5));
        assert_eq!(totals.outcomes[0].price.decimal, Some(1.91));
    }

    #[test]
    fn roster_players_reference_their_team() {
        let doc = Document::new(
            DocumentKind::Roster,
            "rosters/kc.json",
            json!({"players": [
                {"id": 7, "firstName": "Patrick", "lastName": "Mahomes", "currentTeam": {"id": 50, "abbreviation": "KC"}},
                {"firstName": "Nobody"}
            ]}),
        );
        let items = records(&doc);
        let NormalizedRecord::Player(player) = items[0].as_ref().unwrap() else {
            panic!("expected a player");
        };
        assert_eq!(player.source_id, 7);
        assert_eq!(player.team.as_ref().unwrap().natural_key, "KC");
        assert!(items[1].is_err());
    }

    #[test]
    fn walking_twice_yields_the_same_records() {
        let doc = testkit::season_document(2023, "REG", vec![testkit::game(10, "BUF", "KC", None)]);
        assert_eq!(records(&doc), records(&doc));
    }

    #[test]
    fn unknown_season_type_rejects_the_document() {
        let doc = testkit::season_document(2023, "SUMMER", vec![testkit::game(10, "BUF", "KC", None)]);
        let items = records(&doc);
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }
}
