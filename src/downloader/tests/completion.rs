use super::*;

#[tokio::test]
async fn test_success_is_persisted_and_logged() {
    let t = create_test_scheduler(2).await;
    let mut events = t.scheduler.subscribe();

    let id = t.scheduler.submit(song("S1"));
    let seen = collect_until(&mut events, |e| matches!(e, Event::Completed { .. })).await;

    match seen.last() {
        Some(Event::Completed {
            id: done,
            success,
            artifact,
        }) => {
            assert_eq!(done, &id);
            assert!(success);
            let artifact = artifact.as_ref().unwrap();
            assert!(!artifact.reused);
            assert!(artifact.cover_path.is_some());
        }
        other => panic!("unexpected {other:?}"),
    }

    let task = t.scheduler.task(&id).unwrap();
    assert_eq!(task.status, Status::Completed);
    assert!(task.started_at.is_some() && task.completed_at.is_some());
    assert_eq!(stored_status(&t.scheduler, &id).await.as_deref(), Some("completed"));

    let stats = t.scheduler.stats();
    assert_eq!(stats.completed_count, 1);
    assert_eq!(stats.total_successful, 1);
    assert_eq!(stats.success_rate_display(), "100.0%");
    assert_eq!(t.library.records().len(), 1);
    assert_eq!(t.scheduler.progress(&id), Some(1.0));
}

#[tokio::test]
async fn test_fatal_failure_emits_failed_then_completed() {
    let t = create_test_scheduler(2).await;
    t.resolver.fail_audio_for("S1");
    let mut events = t.scheduler.subscribe();

    let id = t.scheduler.submit(song("S1"));
    let seen = collect_until(&mut events, |e| matches!(e, Event::Completed { .. })).await;

    let n = seen.len();
    assert!(matches!(&seen[n - 2], Event::Failed { id: f, error } if *f == id && error.contains("simulated network error")));
    assert!(matches!(
        &seen[n - 1],
        Event::Completed {
            success: false,
            artifact: None,
            ..
        }
    ));

    let task = t.scheduler.task(&id).unwrap();
    assert_eq!(task.status, Status::Failed);
    assert!(task.last_error.unwrap().contains("S1"));

    let stats = t.scheduler.stats();
    assert_eq!(stats.failed_count, 1);
    assert_eq!(stats.total_successful, 0);
    assert_eq!(stats.success_rate_display(), "0.0%");
    assert!(t.library.records().is_empty(), "no library write after fatal failure");

    t.scheduler.flush_persistence().await.unwrap();
    let record = t.scheduler.db.get_task(&id).await.unwrap().unwrap();
    assert_eq!(record.status, "failed");
    assert!(record.error_message.unwrap().contains("simulated network error"));
}

#[tokio::test]
async fn test_failure_frees_slot_for_next_task() {
    let t = create_test_scheduler(1).await;
    t.resolver.fail_audio_for("S1");

    let failed = t.scheduler.submit(song("S1"));
    let next = t.scheduler.submit(song("S2"));

    wait_for_status(&t.scheduler, &failed, Status::Failed).await;
    wait_for_status(&t.scheduler, &next, Status::Completed).await;
}

#[tokio::test]
async fn test_panicking_pipeline_fails_and_frees_slot() {
    let t = create_test_scheduler(1).await;
    t.resolver.panic_audio_for("S1");
    let mut events = t.scheduler.subscribe();

    let broken = t.scheduler.submit(song("S1"));
    let next = t.scheduler.submit(song("S2"));

    let seen = collect_until(&mut events, |e| matches!(e, Event::Failed { .. })).await;
    assert!(matches!(seen.last(), Some(Event::Failed { id, error }) if *id == broken && error.contains("panicked")));

    wait_for_status(&t.scheduler, &broken, Status::Failed).await;
    wait_for_status(&t.scheduler, &next, Status::Completed).await;

    let stats = t.scheduler.stats();
    assert_eq!(stats.active_count, 0);
    assert_eq!(stats.failed_count, 1);
    assert_eq!(stats.total_successful, 1);
    assert_eq!(t.resolver.started(), vec!["S1", "S2"]);
    assert_eq!(stored_status(&t.scheduler, &broken).await.as_deref(), Some("failed"));
}

#[tokio::test]
async fn test_present_song_completes_without_fetching() {
    let t = create_test_scheduler(1).await;
    t.existence.set("S1", true);

    let id = t.scheduler.submit(song("S1"));
    wait_for_status(&t.scheduler, &id, Status::Completed).await;

    assert_eq!(t.resolver.audio_calls(), 0);
    assert!(t.library.records().is_empty());
    assert_eq!(t.scheduler.stats().total_successful, 1);
}

#[tokio::test]
async fn test_outcome_for_inactive_task_is_ignored() {
    let t = create_test_scheduler(1).await;

    t.scheduler.on_task_finished(
        &TaskId::from("ghost_1"),
        Err(crate::error::Error::Other("late".into())),
    );

    let stats = t.scheduler.stats();
    assert_eq!(stats.failed_count, 0);
    assert_eq!(stats.completed_count, 0);
}

#[tokio::test]
async fn test_persistence_failure_does_not_affect_task() {
    let t = create_test_scheduler(1).await;
    // Drop the table out from under the writer; every write now fails
    sqlx::query("DROP TABLE download_tasks")
        .execute(t.scheduler.db.pool())
        .await
        .unwrap();

    let id = t.scheduler.submit(song("S1"));
    wait_for_status(&t.scheduler, &id, Status::Completed).await;
    t.scheduler.flush_persistence().await.unwrap();

    assert_eq!(t.scheduler.stats().completed_count, 1);
}
