use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;
use hue_core::model::{ColorName, LevelId, ProgressSnapshot, RoundOutcome, RoundRecord};
use hue_core::time::fixed_now;
use storage::repository::{ProgressRepository, RoundLogRepository, Storage};
use storage::sqlite::SqliteRepository;

fn round(level: u32, target: &str, outcome: RoundOutcome, offset_secs: i64) -> RoundRecord {
    let started_at = fixed_now() + Duration::seconds(offset_secs);
    RoundRecord::new(
        LevelId::new(level),
        ColorName::new(target).unwrap(),
        outcome,
        2,
        10,
        started_at,
        started_at + Duration::seconds(3),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_progress_round_trips_and_overwrites() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_progress?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert!(repo.load_progress().await.unwrap().is_none());

    let first = ProgressSnapshot {
        current_level: LevelId::new(2),
        unlocked: BTreeSet::from([LevelId::new(1), LevelId::new(2)]),
        level_progress: BTreeMap::from([(LevelId::new(1), 3), (LevelId::new(2), 1)]),
    };
    repo.save_progress(&first).await.unwrap();
    assert_eq!(repo.load_progress().await.unwrap(), Some(first));

    let second = ProgressSnapshot {
        current_level: LevelId::new(1),
        unlocked: BTreeSet::from([LevelId::new(1), LevelId::new(2)]),
        level_progress: BTreeMap::from([(LevelId::new(1), 0)]),
    };
    repo.save_progress(&second).await.unwrap();

    let loaded = repo.load_progress().await.unwrap().unwrap();
    assert_eq!(loaded.current_level, LevelId::new(1));
    assert_eq!(loaded.unlocked, second.unlocked);
    assert_eq!(loaded.progress_for(LevelId::new(1)), 0);
    assert_eq!(loaded.progress_for(LevelId::new(2)), 0);
}

#[tokio::test]
async fn sqlite_round_log_orders_and_filters() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_rounds?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.append_round(&round(1, "Red", RoundOutcome::Won, 0))
        .await
        .unwrap();
    repo.append_round(&round(2, "Pink", RoundOutcome::Lost, 10))
        .await
        .unwrap();
    let newest = repo
        .append_round(&round(1, "Blue", RoundOutcome::Lost, 20))
        .await
        .unwrap();

    let all = repo.recent_rounds(None, 10).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id, newest);
    assert_eq!(all[0].record.target().as_str(), "Blue");
    assert_eq!(all[0].record.outcome(), RoundOutcome::Lost);

    let level_one = repo.recent_rounds(Some(LevelId::new(1)), 10).await.unwrap();
    assert_eq!(level_one.len(), 2);
    assert!(
        level_one
            .iter()
            .all(|row| row.record.level() == LevelId::new(1))
    );

    let limited = repo.recent_rounds(None, 2).await.unwrap();
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(applied, 1);
}

#[tokio::test]
async fn storage_sqlite_wires_both_repositories() {
    let storage = Storage::sqlite("sqlite:file:memdb_storage?mode=memory&cache=shared")
        .await
        .expect("storage");
    storage
        .rounds
        .append_round(&round(1, "Green", RoundOutcome::Won, 0))
        .await
        .unwrap();
    assert_eq!(storage.rounds.recent_rounds(None, 5).await.unwrap().len(), 1);
    assert!(storage.progress.load_progress().await.unwrap().is_none());
}
