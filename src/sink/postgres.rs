//! PostgreSQL sink.
//!
//! Reference entities use `INSERT ... ON CONFLICT DO NOTHING RETURNING id`; when the
//! natural key already exists no row comes back and the caller re-selects it. That
//! keeps concurrent loaders converging on one row per key.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{info, instrument, warn};

use super::{Sink, SinkResult, Table};
use crate::config::DatabaseConfig;
use crate::error::SinkError;
use crate::model::{
    EntityAttributes, EntityKind, EntityRef, EventKey, EventRow, GameOddsKey, GameRow, Identity,
    OddsRow, OddsTarget,
};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
const SAVEPOINT: &str = "loader_record";
/// Columns after the target column in both partial unique indexes on `game_odds`.
const GAME_ODDS_KEY_COLUMNS: &str = "book_id, as_of_time, game_segment, wager_type_id";

pub struct PgSink {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, tx: None }
    }

    // Never put the DSN in a span; it carries the password.
    #[instrument(skip(config), fields(schema = config.schema.as_deref().unwrap_or("public")))]
    pub async fn connect(config: &DatabaseConfig) -> SinkResult<Self> {
        let mut options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| SinkError::Unavailable(format!("invalid database url: {}", e)))?;
        if let Some(schema) = &config.schema {
            options = options.options([("search_path", schema.as_str())]);
        }

        let mut attempt = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(Duration::from_secs(10))
                .connect_with(options.clone())
                .await
            {
                Ok(pool) => {
                    info!("Connected to PostgreSQL");
                    return Ok(Self::new(pool));
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= config.connect_retries {
                        return Err(SinkError::Unavailable(format!(
                            "failed to connect to database after {} attempts: {}",
                            config.connect_retries, e
                        )));
                    }
                    warn!("Database connection attempt {} failed: {}. Retrying...", attempt, e);
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
    }

    /// Create any missing tables and indexes.
    pub async fn ensure_schema(&self) -> SinkResult<()> {
        for statement in SCHEMA_SQL.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Schema ensured");
        Ok(())
    }

    fn conn(&mut self) -> SinkResult<&mut PgConnection> {
        self.tx.as_deref_mut().ok_or(SinkError::NoTransaction)
    }
}

/// Table and natural-key expression per kind. Expressions must render keys exactly
/// as `EntityRef` and `EventKey::cache_key` build them.
fn key_expression(kind: EntityKind) -> (&'static str, &'static str) {
    match kind {
        EntityKind::Sport => ("sports", "sport_key"),
        EntityKind::Season => ("seasons", "year::text || '-' || season_type"),
        EntityKind::Team => ("teams", "abbreviation"),
        EntityKind::Venue => ("venues", "name"),
        EntityKind::Book => ("books", "name"),
        EntityKind::WagerType => ("wager_types", "wager_type"),
        EntityKind::Participant => ("participants", "sport_key || ':' || name"),
        EntityKind::Player => ("players", "source_id::text"),
        EntityKind::Game => ("games", "id::text"),
        EntityKind::Event => (
            "events",
            "home_participant_id::text || ':' || away_participant_id::text || ':' \
             || extract(epoch from commence_time)::bigint::text",
        ),
    }
}

fn target_column(target: OddsTarget) -> (&'static str, Identity) {
    match target {
        OddsTarget::Game(id) => ("game_id", id),
        OddsTarget::Event(id) => ("event_id", id),
    }
}

/// The conflict target must name a partial unique index exactly, predicate included.
fn insert_game_odds_sql(column: &str) -> String {
    format!(
        r#"
        INSERT INTO game_odds ({column}, book_id, wager_type_id, as_of_time, game_segment)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT ({column}, {key_columns})
            WHERE {column} IS NOT NULL
            DO NOTHING
        RETURNING id
        "#,
        column = column,
        key_columns = GAME_ODDS_KEY_COLUMNS
    )
}

#[async_trait]
impl Sink for PgSink {
    async fn begin(&mut self) -> SinkResult<()> {
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn commit(&mut self) -> SinkResult<()> {
        let tx = self.tx.take().ok_or(SinkError::NoTransaction)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> SinkResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }

    async fn savepoint(&mut self) -> SinkResult<()> {
        let conn = self.conn()?;
        sqlx::query(&format!("SAVEPOINT {}", SAVEPOINT))
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn release_savepoint(&mut self) -> SinkResult<()> {
        let conn = self.conn()?;
        sqlx::query(&format!("RELEASE SAVEPOINT {}", SAVEPOINT))
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self) -> SinkResult<()> {
        let conn = self.conn()?;
        sqlx::query(&format!("ROLLBACK TO SAVEPOINT {}", SAVEPOINT))
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn load_keys(&mut self, kind: EntityKind) -> SinkResult<Vec<(String, Identity)>> {
        let (table, key) = key_expression(kind);
        let sql = format!("SELECT {} AS natural_key, id FROM {}", key, table);
        let query = sqlx::query_as::<_, (String, Identity)>(&sql);
        let rows = match self.tx.as_deref_mut() {
            Some(conn) => query.fetch_all(conn).await?,
            None => query.fetch_all(&self.pool).await?,
        };
        Ok(rows)
    }

    async fn insert_entity(&mut self, entity: &EntityRef) -> SinkResult<Option<Identity>> {
        let key = entity.natural_key.as_str();
        let conn = self.conn()?;
        let inserted: Option<(Identity,)> = match &entity.attributes {
            EntityAttributes::Sport { title } => {
                sqlx::query_as(
                    r#"
                    INSERT INTO sports (sport_key, sport_title)
                    VALUES ($1, $2)
                    ON CONFLICT (sport_key) DO NOTHING
                    RETURNING id
                    "#,
                )
                .bind(key)
                .bind(title)
                .fetch_optional(conn)
                .await?
            }
            EntityAttributes::Season { year, season_type } => {
                sqlx::query_as(
                    r#"
                    INSERT INTO seasons (year, season_type)
                    VALUES ($1, $2)
                    ON CONFLICT (year, season_type) DO NOTHING
                    RETURNING id
                    "#,
                )
                .bind(year)
                .bind(season_type.as_str())
                .fetch_optional(conn)
                .await?
            }
            EntityAttributes::Team {
                source_id,
                name,
                city,
            } => {
                sqlx::query_as(
                    r#"
                    INSERT INTO teams (abbreviation, source_id, name, city)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (abbreviation) DO NOTHING
                    RETURNING id
                    "#,
                )
                .bind(key)
                .bind(source_id)
                .bind(name)
                .bind(city)
                .fetch_optional(conn)
                .await?
            }
            EntityAttributes::Venue { source_id, city } => {
                sqlx::query_as(
                    r#"
                    INSERT INTO venues (name, source_id, city)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (name) DO NOTHING
                    RETURNING id
                    "#,
                )
                .bind(key)
                .bind(source_id)
                .bind(city)
                .fetch_optional(conn)
                .await?
            }
            EntityAttributes::Book {
                region,
                is_online,
                is_las_vegas,
            } => {
                sqlx::query_as(
                    r#"
                    INSERT INTO books (name, region, is_online, is_las_vegas)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (name) DO NOTHING
                    RETURNING id
                    "#,
                )
                .bind(key)
                .bind(region)
                .bind(is_online)
                .bind(is_las_vegas)
                .fetch_optional(conn)
                .await?
            }
            EntityAttributes::WagerType => {
                sqlx::query_as(
                    r#"
                    INSERT INTO wager_types (wager_type)
                    VALUES ($1)
                    ON CONFLICT (wager_type) DO NOTHING
                    RETURNING id
                    "#,
                )
                .bind(key)
                .fetch_optional(conn)
                .await?
            }
            EntityAttributes::Participant {
                name,
                sport_key,
                sport_id,
                participant_type,
            } => {
                sqlx::query_as(
                    r#"
                    INSERT INTO participants (sport_key, name, sport_id, participant_type)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (sport_key, name) DO NOTHING
                    RETURNING id
                    "#,
                )
                .bind(sport_key)
                .bind(name)
                .bind(sport_id)
                .bind(participant_type)
                .fetch_optional(conn)
                .await?
            }
            EntityAttributes::Player(player) => {
                let source_id: i64 = key
                    .parse()
                    .map_err(|_| SinkError::Rejected(format!("player key '{}' is not an id", key)))?;
                sqlx::query_as(
                    r#"
                    INSERT INTO players (
                        source_id, first_name, last_name, position, jersey_number,
                        height, weight, birth_date, college, team_id
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                    ON CONFLICT (source_id) DO NOTHING
                    RETURNING id
                    "#,
                )
                .bind(source_id)
                .bind(&player.first_name)
                .bind(&player.last_name)
                .bind(&player.position)
                .bind(player.jersey_number)
                .bind(&player.height)
                .bind(player.weight)
                .bind(player.birth_date)
                .bind(&player.college)
                .bind(player.team_id)
                .fetch_optional(conn)
                .await?
            }
        };
        Ok(inserted.map(|(id,)| id))
    }

    async fn find_entity(
        &mut self,
        kind: EntityKind,
        natural_key: &str,
    ) -> SinkResult<Option<Identity>> {
        let (table, key) = key_expression(kind);
        let sql = format!("SELECT id FROM {} WHERE {} = $1", table, key);
        let conn = self.conn()?;
        let found: Option<Identity> = sqlx::query_scalar(&sql)
            .bind(natural_key)
            .fetch_optional(conn)
            .await?;
        Ok(found)
    }

    async fn upsert_game(&mut self, game: &GameRow) -> SinkResult<Identity> {
        let conn = self.conn()?;
        let state = &game.state;
        let weather = &state.weather;
        // Participants, venue, week, season and start time are write-once.
        let (id,): (Identity,) = sqlx::query_as(
            r#"
            INSERT INTO games (
                id, season_id, week, start_time, ended_time, away_team_id, home_team_id,
                venue_id, venue_allegiance, schedule_status, played_status, attendance,
                weather_type, weather_description, wind_speed_mph, wind_speed_kph,
                wind_direction_degrees, wind_direction_label, temperature_f, temperature_c,
                humidity_percent, away_score_total, home_score_total
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23
            )
            ON CONFLICT (id) DO UPDATE SET
                ended_time = EXCLUDED.ended_time,
                schedule_status = EXCLUDED.schedule_status,
                played_status = EXCLUDED.played_status,
                attendance = EXCLUDED.attendance,
                weather_type = EXCLUDED.weather_type,
                weather_description = EXCLUDED.weather_description,
                wind_speed_mph = EXCLUDED.wind_speed_mph,
                wind_speed_kph = EXCLUDED.wind_speed_kph,
                wind_direction_degrees = EXCLUDED.wind_direction_degrees,
                wind_direction_label = EXCLUDED.wind_direction_label,
                temperature_f = EXCLUDED.temperature_f,
                temperature_c = EXCLUDED.temperature_c,
                humidity_percent = EXCLUDED.humidity_percent,
                away_score_total = EXCLUDED.away_score_total,
                home_score_total = EXCLUDED.home_score_total
            RETURNING id
            "#,
        )
        .bind(game.id)
        .bind(game.season_id)
        .bind(game.week)
        .bind(game.start_time)
        .bind(state.ended_time)
        .bind(game.away_team_id)
        .bind(game.home_team_id)
        .bind(game.venue_id)
        .bind(&game.venue_allegiance)
        .bind(&state.schedule_status)
        .bind(&state.played_status)
        .bind(state.attendance)
        .bind(&weather.weather_type)
        .bind(&weather.description)
        .bind(weather.wind_speed_mph)
        .bind(weather.wind_speed_kph)
        .bind(weather.wind_direction_degrees)
        .bind(&weather.wind_direction_label)
        .bind(weather.temperature_f)
        .bind(weather.temperature_c)
        .bind(weather.humidity_percent)
        .bind(state.away_score_total)
        .bind(state.home_score_total)
        .fetch_one(conn)
        .await?;
        Ok(id)
    }

    async fn find_game(&mut self, id: i64) -> SinkResult<Option<Identity>> {
        let conn = self.conn()?;
        let found: Option<Identity> = sqlx::query_scalar("SELECT id FROM games WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(found)
    }

    async fn upsert_event(&mut self, event: &EventRow) -> SinkResult<Identity> {
        let conn = self.conn()?;
        let (id,): (Identity,) = sqlx::query_as(
            r#"
            INSERT INTO events (
                external_id, event_name, sport_id, commence_time,
                home_participant_id, away_participant_id
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (home_participant_id, away_participant_id, commence_time) DO UPDATE SET
                external_id = COALESCE(events.external_id, EXCLUDED.external_id)
            RETURNING id
            "#,
        )
        .bind(&event.external_id)
        .bind(&event.event_name)
        .bind(event.sport_id)
        .bind(event.key.commence_time)
        .bind(event.key.home_participant_id)
        .bind(event.key.away_participant_id)
        .fetch_one(conn)
        .await?;
        Ok(id)
    }

    async fn find_event(&mut self, key: &EventKey) -> SinkResult<Option<Identity>> {
        let conn = self.conn()?;
        let found: Option<Identity> = sqlx::query_scalar(
            r#"
            SELECT id FROM events
            WHERE home_participant_id = $1 AND away_participant_id = $2 AND commence_time = $3
            "#,
        )
        .bind(key.home_participant_id)
        .bind(key.away_participant_id)
        .bind(key.commence_time)
        .fetch_optional(conn)
        .await?;
        Ok(found)
    }

    async fn insert_game_odds(&mut self, key: &GameOddsKey) -> SinkResult<Option<Identity>> {
        let (column, target_id) = target_column(key.target);
        let sql = insert_game_odds_sql(column);
        let conn = self.conn()?;
        let inserted: Option<Identity> = sqlx::query_scalar(&sql)
            .bind(target_id)
            .bind(key.book_id)
            .bind(key.wager_type_id)
            .bind(key.as_of_time)
            .bind(&key.segment)
            .fetch_optional(conn)
            .await?;
        Ok(inserted)
    }

    async fn find_game_odds(&mut self, key: &GameOddsKey) -> SinkResult<Option<Identity>> {
        let (column, target_id) = target_column(key.target);
        let sql = format!(
            r#"
            SELECT id FROM game_odds
            WHERE {column} = $1 AND book_id = $2 AND wager_type_id = $3
              AND as_of_time = $4 AND game_segment = $5
            "#,
            column = column
        );
        let conn = self.conn()?;
        let found: Option<Identity> = sqlx::query_scalar(&sql)
            .bind(target_id)
            .bind(key.book_id)
            .bind(key.wager_type_id)
            .bind(key.as_of_time)
            .bind(&key.segment)
            .fetch_optional(conn)
            .await?;
        Ok(found)
    }

    async fn insert_odds(&mut self, row: &OddsRow) -> SinkResult<Option<Identity>> {
        let line = &row.line;
        let conn = self.conn()?;
        let inserted: Option<Identity> = sqlx::query_scalar(
            r#"
            INSERT INTO odds (
                game_odds_id, outcome_type, odds_american, odds_decimal, odds_fractional,
                spread, over_under
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (game_odds_id, outcome_type) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(row.game_odds_id)
        .bind(line.outcome_type.as_str())
        .bind(line.price.american)
        .bind(line.price.decimal)
        .bind(&line.price.fractional)
        .bind(line.spread)
        .bind(line.total)
        .fetch_optional(conn)
        .await?;
        Ok(inserted)
    }

    async fn count(&mut self, table: Table) -> SinkResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let query = sqlx::query_scalar::<_, i64>(&sql);
        let count = match self.tx.as_deref_mut() {
            Some(conn) => query.fetch_one(conn).await?,
            None => query.fetch_one(&self.pool).await?,
        };
        Ok(count)
    }
}
