use chrono::Duration;
use lesson_core::model::{LessonId, LessonSummary, ProgressionRules, SummaryId, UserProfile};
use lesson_core::time::fixed_now;
use storage::repository::{LessonSummaryRepository, ProfileRepository, StorageError};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_profile_roundtrip_keeps_lesson_order() {
    let repo = connect("memdb_profile_roundtrip").await;
    assert!(repo.load_profile().await.unwrap().is_none());

    let rules = ProgressionRules::default();
    let profile = UserProfile::default()
        .complete_lesson(LessonId::new(2), 30, &rules)
        .complete_lesson(LessonId::new(1), 30, &rules)
        .complete_lesson(LessonId::new(2), 30, &rules);
    repo.save_profile(&profile).await.unwrap();

    let loaded = repo.load_profile().await.unwrap().expect("profile stored");
    assert_eq!(loaded, profile);
    assert_eq!(
        loaded.completed_lesson_ids(),
        &[LessonId::new(2), LessonId::new(1)]
    );
    assert_eq!(loaded.experience_points(), 1340);
    assert_eq!(loaded.streak(), 8);
}

#[tokio::test]
async fn sqlite_profile_save_overwrites_previous_row() {
    let repo = connect("memdb_profile_overwrite").await;
    let rules = ProgressionRules::default();

    let first = UserProfile::default().complete_lesson(LessonId::new(1), 30, &rules);
    repo.save_profile(&first).await.unwrap();
    let reset = UserProfile::default();
    repo.save_profile(&reset).await.unwrap();

    let loaded = repo.load_profile().await.unwrap().unwrap();
    assert_eq!(loaded, reset);
    assert!(loaded.completed_lesson_ids().is_empty());
}

#[tokio::test]
async fn sqlite_migrations_are_idempotent() {
    let repo = connect("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
    repo.save_profile(&UserProfile::default()).await.unwrap();
}

#[tokio::test]
async fn sqlite_summaries_append_and_list() {
    let repo = connect("memdb_summaries").await;
    let now = fixed_now();

    let a = LessonSummary::new(LessonId::new(1), now, now + Duration::seconds(40), 4, 3, 1, 2, 30)
        .unwrap();
    let b = LessonSummary::new(LessonId::new(2), now, now + Duration::seconds(90), 3, 3, 0, 3, 30)
        .unwrap();
    let id_a = repo.append_summary(&a).await.unwrap();
    let id_b = repo.append_summary(&b).await.unwrap();

    assert_eq!(repo.get_summary(id_a).await.unwrap(), a);

    let all = repo.list_summaries(None, 10).await.unwrap();
    let ids: Vec<_> = all.iter().map(|row| row.id).collect();
    assert_eq!(ids, [id_b, id_a]);

    let only_first = repo.list_summaries(Some(LessonId::new(1)), 10).await.unwrap();
    assert_eq!(only_first.len(), 1);
    assert_eq!(only_first[0].summary.mistakes(), 1);

    assert!(matches!(
        repo.get_summary(SummaryId::new(404)).await,
        Err(StorageError::NotFound)
    ));
}
