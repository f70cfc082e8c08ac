//! End-to-end loads against the in-memory sink.

use serde_json::json;

use sports_loader::model::{EntityAttributes, EntityKind, OutcomeType};
use sports_loader::sink::Table;
use sports_loader::testkit::{self, StaticSource};
use sports_loader::{
    Document, DocumentKind, LoadError, LoadPlan, MemorySink, RunCoordinator, RunState, RunSummary,
};

const AS_OF: &str = "2023-09-07T12:00:00Z";

async fn load(sink: &mut MemorySink, documents: Vec<Document>) -> RunSummary {
    let source = StaticSource::new(documents);
    RunCoordinator::new(sink)
        .run(&source, &LoadPlan::default())
        .await
        .expect("run should succeed")
}

fn counts(sink: &MemorySink) -> Vec<(Table, i64)> {
    Table::ALL.iter().map(|&t| (t, sink.rows(t))).collect()
}

fn two_game_season() -> Document {
    testkit::season_document(
        2023,
        "REG",
        vec![
            testkit::game(10, "BUF", "KC", Some("Arrowhead Stadium")),
            testkit::game(11, "NYJ", "NE", Some("Gillette Stadium")),
        ],
    )
}

fn moneyline_odds() -> Document {
    testkit::odds_document(vec![
        testkit::game_lines(
            10,
            "FanDuel",
            vec![testkit::moneyline(AS_OF, Some(130), Some(-150), None)],
        ),
        testkit::game_lines(
            11,
            "FanDuel",
            vec![testkit::moneyline(AS_OF, Some(130), Some(-150), None)],
        ),
    ])
}

#[tokio::test]
async fn two_games_with_moneylines_load_once() {
    let mut sink = MemorySink::new();
    let summary = load(&mut sink, vec![moneyline_odds(), two_game_season()]).await;

    assert_eq!(summary.state, RunState::Done);
    assert_eq!(summary.records_failed, 0);
    assert_eq!(sink.rows(Table::Games), 2);
    assert_eq!(sink.rows(Table::Books), 1);
    assert_eq!(sink.rows(Table::GameOdds), 2);
    assert_eq!(sink.rows(Table::Odds), 4);
    assert_eq!(sink.rows(Table::Teams), 4);
    assert_eq!(sink.rows(Table::Venues), 2);
    assert_eq!(sink.rows(Table::Seasons), 1);
    assert_eq!(summary.outcomes_written, 4);
}

#[tokio::test]
async fn second_run_adds_nothing() {
    let mut sink = MemorySink::new();
    load(&mut sink, vec![two_game_season(), moneyline_odds()]).await;
    let after_first = counts(&sink);

    let second = load(&mut sink, vec![two_game_season(), moneyline_odds()]).await;

    assert_eq!(counts(&sink), after_first);
    assert_eq!(second.entities_inserted, 0);
    assert_eq!(second.outcomes_written, 0);
    assert_eq!(second.duplicate_outcomes, 0);
    assert!(second.failures.is_empty());
}

#[tokio::test]
async fn null_draw_price_writes_only_home_and_away() {
    let mut sink = MemorySink::new();
    let summary = load(&mut sink, vec![two_game_season(), moneyline_odds()]).await;

    let mut outcomes: Vec<OutcomeType> = sink.odds().map(|o| o.line.outcome_type.clone()).collect();
    outcomes.sort();
    outcomes.dedup();
    assert_eq!(outcomes, vec![OutcomeType::Away, OutcomeType::Home]);
    assert!(sink.odds().all(|o| o.line.price.american.is_some()));
    assert!(summary.failures.is_empty());
}

#[tokio::test]
async fn null_wager_group_does_not_drop_its_siblings() {
    let mut lines = testkit::game_lines(
        10,
        "FanDuel",
        vec![testkit::moneyline(AS_OF, Some(130), Some(-150), None)],
    );
    lines["lines"][0]["pointSpreads"] = json!(null);
    let odds = testkit::odds_document(vec![lines]);

    let mut sink = MemorySink::new();
    let summary = load(&mut sink, vec![two_game_season(), odds]).await;

    assert_eq!(summary.records_skipped, 0);
    assert_eq!(summary.records_failed, 0);
    assert_eq!(sink.rows(Table::GameOdds), 1);
    assert_eq!(sink.rows(Table::Odds), 2);
}

#[tokio::test]
async fn all_null_entry_still_records_the_observation() {
    let odds = testkit::odds_document(vec![testkit::game_lines(
        10,
        "FanDuel",
        vec![testkit::moneyline(AS_OF, None, None, None)],
    )]);

    let mut sink = MemorySink::new();
    let summary = load(&mut sink, vec![two_game_season(), odds]).await;

    assert!(summary.failures.is_empty());
    assert_eq!(sink.rows(Table::Books), 1);
    assert_eq!(sink.rows(Table::GameOdds), 1);
    assert_eq!(sink.rows(Table::Odds), 0);
}

#[tokio::test]
async fn newest_game_state_wins_but_identity_fields_stay() {
    let mut sink = MemorySink::new();
    load(&mut sink, vec![two_game_season()]).await;

    let mut update = testkit::game(10, "BUF", "KC", Some("Arrowhead Stadium"));
    update["schedule"]["attendance"] = json!(65000);
    update["schedule"]["startTime"] = json!("2023-09-09T00:00:00Z");
    update["schedule"]["homeTeam"]["abbreviation"] = json!("DEN");
    update["score"]["homeScoreTotal"] = json!(24);
    load(
        &mut sink,
        vec![testkit::season_document(2023, "REG", vec![update])],
    )
    .await;

    let game = sink.game(10).unwrap();
    assert_eq!(game.state.attendance, Some(65000));
    assert_eq!(game.state.home_score_total, Some(24));
    assert_eq!(
        game.start_time.unwrap().to_rfc3339(),
        "2023-09-08T00:20:00+00:00"
    );
    assert_eq!(
        game.home_team_id,
        sink.entity(EntityKind::Team, "KC").unwrap().id
    );
    assert_eq!(sink.rows(Table::Games), 2);
}

#[tokio::test]
async fn shared_teams_are_inserted_once_across_documents() {
    let mut sink = MemorySink::new();
    let week_two = testkit::season_document(
        2023,
        "REG",
        vec![
            testkit::game(12, "KC", "NYJ", None),
            testkit::game(13, "NE", "BUF", None),
        ],
    );
    load(&mut sink, vec![two_game_season(), week_two]).await;

    assert_eq!(sink.rows(Table::Teams), 4);
    assert_eq!(sink.rows(Table::Games), 4);
}

#[tokio::test]
async fn odds_for_unknown_game_fail_alone() {
    let mut sink = MemorySink::new();
    let odds = testkit::odds_document(vec![
        testkit::game_lines(999, "FanDuel", vec![testkit::moneyline(AS_OF, Some(110), Some(-130), None)]),
        testkit::game_lines(10, "FanDuel", vec![testkit::moneyline(AS_OF, Some(130), Some(-150), None)]),
    ]);
    let summary = load(&mut sink, vec![two_game_season(), odds]).await;

    assert_eq!(summary.state, RunState::Done);
    assert_eq!(summary.records_failed, 1);
    assert_eq!(summary.failures[0].kind, "resolution");
    assert_eq!(sink.rows(Table::GameOdds), 1);
    assert_eq!(sink.rows(Table::Odds), 2);
}

#[tokio::test]
async fn rejected_entity_rolls_back_only_its_record() {
    let mut sink = MemorySink::new();
    sink.reject_key(EntityKind::Venue, "Gillette Stadium");

    let summary = load(&mut sink, vec![two_game_season()]).await;

    assert_eq!(summary.records_written, 1);
    assert_eq!(summary.records_failed, 1);
    assert!(sink.game(10).is_some());
    assert!(sink.game(11).is_none());
    // NYJ and NE were inserted inside the failed record's savepoint.
    assert_eq!(sink.rows(Table::Teams), 2);

    // The forgotten identities resolve again on the next run.
    let retry = testkit::game(11, "NYJ", "NE", None);
    let summary = load(
        &mut sink,
        vec![testkit::season_document(2023, "REG", vec![retry])],
    )
    .await;
    assert_eq!(summary.records_failed, 0);
    assert_eq!(sink.rows(Table::Teams), 4);
}

#[tokio::test]
async fn malformed_subtrees_are_counted_and_skipped() {
    let mut sink = MemorySink::new();
    let mut no_home = testkit::game(12, "MIA", "LAC", None);
    no_home["schedule"]["homeTeam"] = json!(null);
    let season = testkit::season_document(
        2023,
        "REG",
        vec![testkit::game(10, "BUF", "KC", None), no_home],
    );
    let summary = load(&mut sink, vec![season]).await;

    assert_eq!(summary.records_written, 1);
    assert_eq!(summary.records_skipped, 1);
    assert_eq!(summary.failures[0].kind, "malformed_record");
    assert_eq!(sink.rows(Table::Games), 1);
}

#[tokio::test]
async fn lost_sink_fails_the_run_and_commits_nothing() {
    let mut sink = MemorySink::new();
    sink.disconnect_after(20);

    let source = StaticSource::new(vec![two_game_season(), moneyline_odds()]);
    let failed = RunCoordinator::new(&mut sink)
        .run(&source, &LoadPlan::default())
        .await
        .unwrap_err();

    assert!(matches!(failed.error, LoadError::SinkUnavailable(_)));
    assert_eq!(failed.summary.state, RunState::Failed);
    assert!(counts(&sink).iter().all(|&(_, rows)| rows == 0));

    // Retrying the whole batch from scratch is safe.
    sink.reconnect();
    let summary = load(&mut sink, vec![two_game_season(), moneyline_odds()]).await;
    assert_eq!(summary.state, RunState::Done);
    assert_eq!(sink.rows(Table::Games), 2);
    assert_eq!(sink.rows(Table::Odds), 4);
}

fn event_snapshot(timestamp: &str, id: Option<&str>) -> Document {
    Document::new(
        DocumentKind::Events,
        format!("events/{}.json", timestamp),
        json!({
            "timestamp": timestamp,
            "data": [{
                "id": id,
                "sport_key": "americanfootball_nfl",
                "commence_time": "2024-10-06T17:00:00Z",
                "home_team": "Chicago Bears",
                "away_team": "Carolina Panthers",
                "bookmakers": [{
                    "key": "fanduel",
                    "title": "FanDuel",
                    "markets": [{
                        "key": "h2h",
                        "outcomes": [
                            {"name": "Chicago Bears", "price": -200},
                            {"name": "Carolina Panthers", "price": 170}
                        ]
                    }]
                }]
            }]
        }),
    )
}

#[tokio::test]
async fn event_snapshots_share_one_event() {
    let mut sink = MemorySink::new();
    let summary = load(
        &mut sink,
        vec![
            event_snapshot("2024-10-04T12:00:00Z", None),
            event_snapshot("2024-10-05T12:00:00Z", Some("e912")),
        ],
    )
    .await;

    assert_eq!(summary.records_failed, 0);
    assert_eq!(sink.rows(Table::Events), 1);
    assert_eq!(sink.rows(Table::Participants), 2);
    assert_eq!(sink.rows(Table::GameOdds), 2);
    assert_eq!(sink.rows(Table::Odds), 4);
    assert_eq!(sink.rows(Table::Books), 1);
    assert_eq!(sink.rows(Table::Sports), 1);
    assert_eq!(
        sink.entity(EntityKind::Sport, "americanfootball_nfl")
            .map(|sport| sport.attributes.clone()),
        Some(EntityAttributes::Sport { title: None })
    );

    let before = counts(&sink);
    load(&mut sink, vec![event_snapshot("2024-10-05T12:00:00Z", Some("e912"))]).await;
    assert_eq!(counts(&sink), before);
}

#[tokio::test]
async fn players_keep_the_team_they_were_first_seen_with() {
    let roster = |team: &str| {
        Document::new(
            DocumentKind::Roster,
            format!("rosters/{}.json", team),
            json!({"players": [{
                "id": 7,
                "firstName": "Patrick",
                "lastName": "Mahomes",
                "primaryPosition": "QB",
                "jerseyNumber": 15,
                "currentTeam": {"id": 50, "abbreviation": team}
            }]}),
        )
    };

    let mut sink = MemorySink::new();
    load(&mut sink, vec![roster("KC")]).await;
    load(&mut sink, vec![roster("DEN")]).await;

    let kc = sink.entity(EntityKind::Team, "KC").unwrap().id;
    let player = sink.entity(EntityKind::Player, "7").unwrap();
    match &player.attributes {
        EntityAttributes::Player(attrs) => {
            assert_eq!(attrs.team_id, Some(kc));
            assert_eq!(attrs.jersey_number, Some(15));
        }
        other => panic!("unexpected attributes {:?}", other),
    }
    assert_eq!(sink.rows(Table::Players), 1);
}
