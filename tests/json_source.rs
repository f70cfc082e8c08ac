//! Loading straight from a data directory laid out by collection.

use std::fs;

use serde_json::json;

use sports_loader::sink::Table;
use sports_loader::{
    DocumentFilter, DocumentKind, JsonDirSource, LoadPlan, MemorySink, RunCoordinator,
};

#[tokio::test]
async fn loads_a_directory_filtered_by_season() {
    let root = tempfile::tempdir().unwrap();
    let seasons = root.path().join("seasons");
    let odds = root.path().join("odds");
    fs::create_dir(&seasons).unwrap();
    fs::create_dir(&odds).unwrap();

    fs::write(
        seasons.join("2023-regular.json"),
        json!({
            "season": 2023,
            "season_type": "REG",
            "response": {"games": [{
                "schedule": {
                    "id": 10,
                    "startTime": "2023-09-08T00:20:00Z",
                    "awayTeam": {"id": 48, "abbreviation": "DET"},
                    "homeTeam": {"id": 50, "abbreviation": "KC"}
                }
            }]}
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        seasons.join("2022-regular.json"),
        json!({
            "season": "2022",
            "season_type": "REG",
            "response": {"games": [{
                "schedule": {
                    "id": 1,
                    "awayTeam": {"abbreviation": "BUF"},
                    "homeTeam": {"abbreviation": "LA"}
                }
            }]}
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        odds.join("2023-week-1.json"),
        json!({
            "season": 2023,
            "season_type": "REG",
            "week": 1,
            "response": {"gameLines": [{
                "game": {"id": 10},
                "lines": [{
                    "source": {"name": "Caesars"},
                    "pointSpreads": [{
                        "asOfTime": "2023-09-07T18:00:00Z",
                        "pointSpread": {
                            "gameSegment": "FULL",
                            "awaySpread": 6.5,
                            "awayLine": {"american": "-110"},
                            "homeSpread": -6.5,
                            "homeLine": {"american": "-110"}
                        }
                    }]
                }]
            }]}
        })
        .to_string(),
    )
    .unwrap();

    let plan = LoadPlan {
        kinds: vec![DocumentKind::Season, DocumentKind::Odds],
        filter: DocumentFilter::new().with("season", 2023),
    };
    let source = JsonDirSource::new(root.path());
    let mut sink = MemorySink::new();
    let summary = RunCoordinator::new(&mut sink)
        .run(&source, &plan)
        .await
        .unwrap();

    assert_eq!(summary.documents, 2);
    assert_eq!(sink.rows(Table::Games), 1);
    assert!(sink.game(1).is_none());
    assert_eq!(sink.rows(Table::Odds), 2);
    assert!(sink.odds().all(|o| o.line.spread.is_some()));
}
