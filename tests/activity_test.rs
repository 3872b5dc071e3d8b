mod common;

use common::create_test_storage;
use fitcoach_lib::activity::ActivityLogger;
use fitcoach_lib::error::CoachError;
use fitcoach_lib::models::LogType;

async fn logger_with_profile() -> (ActivityLogger, i64) {
    let storage = create_test_storage().await;
    let profile_id = storage.list_profiles().await.unwrap()[0].id;
    (ActivityLogger::new(storage), profile_id)
}

#[tokio::test]
async fn weight_entry_requires_a_value() {
    let (logger, id) = logger_with_profile().await;

    let result = logger.log_activity(id, LogType::Weight, "morning", None).await;
    assert!(matches!(result, Err(CoachError::Validation(_))));

    let negative = logger.log_activity(id, LogType::Weight, "", Some(-3.0)).await;
    assert!(matches!(negative, Err(CoachError::Validation(_))));

    assert!(logger.recent_activity(id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn workouts_and_notes_cannot_carry_a_weight() {
    let (logger, id) = logger_with_profile().await;

    let workout = logger.log_activity(id, LogType::Workout, "Leg day", Some(80.0)).await;
    assert!(matches!(workout, Err(CoachError::Validation(_))));

    let note = logger.log_activity(id, LogType::Note, "", None).await;
    assert!(matches!(note, Err(CoachError::Validation(_))));
}

#[tokio::test]
async fn weigh_in_shows_up_in_the_series() {
    let (logger, id) = logger_with_profile().await;

    let entry = logger.log_activity(id, LogType::Weight, "", Some(70.0)).await.unwrap();
    assert_eq!(entry.log_type, LogType::Weight);
    assert_eq!(entry.weight_kg, Some(70.0));

    let series = logger.weight_series(id).await.unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].timestamp, entry.timestamp);
    assert_eq!(series[0].weight_kg, 70.0);
}

#[tokio::test]
async fn weight_series_skips_other_entries_and_runs_oldest_first() {
    let (logger, id) = logger_with_profile().await;

    logger.log_activity(id, LogType::Weight, "", Some(72.0)).await.unwrap();
    logger.log_activity(id, LogType::Workout, "Intervals 6x400m", None).await.unwrap();
    logger.log_activity(id, LogType::Weight, "after holidays", Some(73.5)).await.unwrap();
    logger.log_activity(id, LogType::Note, "Slept badly", None).await.unwrap();
    logger.log_activity(id, LogType::Weight, "", Some(71.8)).await.unwrap();

    let weights: Vec<f64> = logger
        .weight_series(id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.weight_kg)
        .collect();
    assert_eq!(weights, vec![72.0, 73.5, 71.8]);
}

#[tokio::test]
async fn recent_activity_is_newest_first_and_limited() {
    let (logger, id) = logger_with_profile().await;
    for day in 1..=5 {
        logger
            .log_activity(id, LogType::Workout, &format!("Session {day}"), None)
            .await
            .unwrap();
    }

    let recent = logger.recent_activity(id, 3).await.unwrap();
    let notes: Vec<&str> = recent.iter().map(|e| e.note.as_str()).collect();
    assert_eq!(notes, vec!["Session 5", "Session 4", "Session 3"]);
    assert!(recent.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[tokio::test]
async fn notes_are_trimmed() {
    let (logger, id) = logger_with_profile().await;
    let entry = logger
        .log_activity(id, LogType::Note, "  Felt strong today \n", None)
        .await
        .unwrap();
    assert_eq!(entry.note, "Felt strong today");
}

#[tokio::test]
async fn unknown_profile_is_not_found() {
    let (logger, _) = logger_with_profile().await;

    let logged = logger.log_activity(99, LogType::Workout, "Run", None).await;
    assert!(matches!(logged, Err(CoachError::NotFound(99))));
    assert!(matches!(logger.recent_activity(99, 10).await, Err(CoachError::NotFound(99))));
    assert!(matches!(logger.weight_series(99).await, Err(CoachError::NotFound(99))));
}

#[tokio::test]
async fn log_order_survives_a_clock_step_backwards() {
    let storage = create_test_storage().await;
    let id = storage.list_profiles().await.unwrap()[0].id;
    let logger = ActivityLogger::new(storage.clone());

    let first = logger.log_activity(id, LogType::Weight, "", Some(72.0)).await.unwrap();
    // Pretend the clock was 5 s ahead when the first weigh-in was written
    sqlx::query("UPDATE workout_log SET timestamp = timestamp + 5000 WHERE id = ?")
        .bind(first.id)
        .execute(storage.pool())
        .await
        .unwrap();
    let second = logger.log_activity(id, LogType::Weight, "", Some(71.5)).await.unwrap();

    let weights: Vec<f64> = logger
        .weight_series(id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.weight_kg)
        .collect();
    assert_eq!(weights, vec![72.0, 71.5]);

    let recent = logger.recent_activity(id, 10).await.unwrap();
    assert_eq!(recent[0], second);
    assert_eq!(recent[1].id, first.id);
}
