use assess_core::model::{
    Provenance, QuestionGrade, QuestionId, QuestionOutcome, QuizId, SessionId, SubmissionResult,
};
use assess_core::time::fixed_now;
use chrono::Duration;
use storage::repository::{AttemptRepository, DraftAnswer, DraftRepository, Storage, StorageError};
use storage::sqlite::SqliteRepository;

fn result(quiz: u64, minutes_later: i64, provenance: Provenance) -> SubmissionResult {
    SubmissionResult {
        session_id: SessionId::generate(),
        quiz_id: QuizId::new(quiz),
        points_earned: 2,
        points_possible: 6,
        questions: vec![
            QuestionGrade {
                question_id: QuestionId::new(1),
                outcome: QuestionOutcome::Correct,
                points_awarded: 2,
            },
            QuestionGrade {
                question_id: QuestionId::new(2),
                outcome: QuestionOutcome::Unanswered,
                points_awarded: 0,
            },
        ],
        incident_count: 3,
        elapsed_seconds: 42,
        provenance,
        expired: minutes_later % 2 == 1,
        started_at: fixed_now(),
        completed_at: fixed_now() + Duration::minutes(minutes_later),
    }
}

fn draft(question: u64, value: &str) -> DraftAnswer {
    DraftAnswer {
        question_id: QuestionId::new(question),
        value: value.into(),
        saved_at: fixed_now(),
    }
}

#[tokio::test]
async fn sqlite_drafts_upsert_and_clear() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_drafts?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let quiz = QuizId::new(7);
    repo.save_draft(quiz, &draft(3, "first")).await.unwrap();
    repo.save_draft(quiz, &draft(1, "one")).await.unwrap();
    repo.save_draft(quiz, &draft(3, "second")).await.unwrap();
    repo.save_draft(QuizId::new(8), &draft(1, "elsewhere")).await.unwrap();

    let drafts = repo.load_drafts(quiz).await.unwrap();
    assert_eq!(drafts, vec![draft(1, "one"), draft(3, "second")]);

    repo.clear_drafts(quiz).await.unwrap();
    assert!(repo.load_drafts(quiz).await.unwrap().is_empty());
    assert_eq!(repo.load_drafts(QuizId::new(8)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_attempts_roundtrip_and_reject_duplicates() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_attempts?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let older = result(1, 0, Provenance::ServerGraded);
    let newer = result(1, 5, Provenance::LocalFallback);
    let first = repo.append_attempt(&older).await.unwrap();
    let second = repo.append_attempt(&newer).await.unwrap();
    repo.append_attempt(&result(2, 1, Provenance::ServerGraded))
        .await
        .unwrap();

    assert!(matches!(
        repo.append_attempt(&older).await,
        Err(StorageError::Conflict)
    ));

    assert_eq!(repo.get_attempt(second).await.unwrap(), newer);
    let rows = repo.list_attempts(QuizId::new(1), 10).await.unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, [second, first]);
    assert_eq!(rows[1].result, older);

    let limited = repo.list_attempts(QuizId::new(1), 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert!(matches!(
        repo.get_attempt(9_999).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let url = "sqlite:file:memdb_migrate_twice?mode=memory&cache=shared";
    let storage = Storage::sqlite(url).await.expect("first open");
    storage
        .drafts
        .save_draft(QuizId::new(1), &draft(1, "kept"))
        .await
        .unwrap();

    let repo = SqliteRepository::connect(url).await.expect("connect");
    repo.migrate().await.expect("second migrate");
    assert_eq!(repo.load_drafts(QuizId::new(1)).await.unwrap().len(), 1);
}
