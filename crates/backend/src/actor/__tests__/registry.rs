//! TrackerRegistry tests: one tracker per project, resume, clear, shutdown.

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use tokio::{sync::mpsc, time::sleep};

  use crate::{
    actor::{TrackerError, __tests__::helpers::*},
    db::StateStore,
    domain::{
      project::ProjectId,
      state::{IndexingState, IndexingStatus},
    },
  };

  #[tokio::test(start_paused = true)]
  async fn test_second_start_is_refused_while_running() {
    let ctx = TrackerTestContext::new(StartScript::Hang, vec![]);
    let registry = ctx.registry();
    let (tx, _rx) = mpsc::unbounded_channel();

    let handle = registry.start("Acme", tx.clone()).await.expect("first start");
    let second = registry.start(" ACME ", tx.clone()).await;
    let other = registry.start("Acme!", tx).await;
    sleep(ms(1)).await;

    // " ACME " normalizes to "_acme_", "Acme!" to "acme"
    assert!(second.is_ok());
    assert!(matches!(other, Err(TrackerError::AlreadyRunning(ref id)) if id.as_str() == "acme"));
    assert_eq!(ctx.backend.start_calls(), 2);
    assert_eq!(
      registry.active(),
      vec![ProjectId::from_raw("_acme_"), ProjectId::from_raw("acme")]
    );
    assert_eq!(registry.get(handle.project_id()).map(|h| h.job_id()), Some(handle.job_id()));

    registry.shutdown().await;
  }

  #[tokio::test(start_paused = true)]
  async fn test_finished_tracker_frees_the_slot() {
    let ctx = TrackerTestContext::new(
      StartScript::Fail {
        after: ms(10),
        message: "quota exceeded".into(),
      },
      vec![],
    );
    let registry = ctx.registry();
    let (tx, _rx) = mpsc::unbounded_channel();

    let first = registry.start("Acme", tx.clone()).await.expect("start");
    first.wait().await;
    sleep(ms(10)).await;

    assert!(registry.get(first.project_id()).is_none());
    assert!(registry.active().is_empty());

    let second = registry.start("Acme", tx).await.expect("restart after failure");
    sleep(ms(1)).await;
    assert_ne!(first.job_id(), second.job_id());
    assert_eq!(ctx.backend.start_calls(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_clear_refused_while_running_then_allowed() {
    let ctx = TrackerTestContext::new(StartScript::Hang, vec![]);
    let registry = ctx.registry();
    let (tx, _rx) = mpsc::unbounded_channel();
    let handle = registry.start("Acme", tx).await.expect("start");
    let id = handle.project_id().clone();

    assert!(matches!(registry.clear(&id).await, Err(TrackerError::AlreadyRunning(_))));

    assert!(registry.cancel(&id));
    handle.wait().await;
    registry.clear(&id).await.expect("clear after finish");

    assert_eq!(registry.load_state(&id).await.expect("load"), None);
    assert!(!registry.cancel(&id));
  }

  #[tokio::test(start_paused = true)]
  async fn test_load_state_prefers_live_tracker() {
    let ctx = TrackerTestContext::new(StartScript::Hang, vec![(ms(0), indexing(42, "Embedding"))]);
    let registry = ctx.registry();
    let (tx, _rx) = mpsc::unbounded_channel();
    let handle = registry.start("Acme", tx).await.expect("start");

    sleep(ms(120)).await;
    let state = registry.load_state(handle.project_id()).await.expect("load").expect("state");
    assert_eq!(state.percent, 42);
    assert_eq!(state.current_step, "Embedding");

    let listed = registry.list_states().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].percent, 42);

    registry.shutdown().await;
  }

  #[tokio::test(start_paused = true)]
  async fn test_resume_polls_without_restarting() {
    let ctx = TrackerTestContext::new(StartScript::Hang, vec![(ms(0), completed(Some(stats(2, 8, 0))))]);
    let mut left_behind = IndexingState::started(ProjectId::from_raw("acme"), "Acme");
    left_behind.apply_progress(40, "Embedding", None).expect("progress");
    ctx.store.save(&left_behind).await.expect("seed");

    let registry = ctx.registry();
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = registry.resume(&ProjectId::from_raw("acme"), tx).await.expect("resume");
    let events = collect(rx).await;

    assert_eq!(progress_of(&events), vec![(40, "Embedding".to_string())]);
    let done = handle.wait().await;
    assert_eq!(done.status, IndexingStatus::Completed);
    assert_eq!(done.stats, Some(stats(2, 8, 0)));
    assert_eq!(ctx.backend.start_calls(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_resume_rejects_terminal_and_missing_rows() {
    let ctx = TrackerTestContext::new(StartScript::Hang, vec![]);
    let mut finished = IndexingState::started(ProjectId::from_raw("done"), "Done");
    finished.complete(stats(1, 1, 1)).expect("complete");
    ctx.store.save(&finished).await.expect("seed");

    let registry = ctx.registry();
    let (tx, _rx) = mpsc::unbounded_channel();

    let terminal = registry.resume(&ProjectId::from_raw("done"), tx.clone()).await;
    assert!(matches!(
      terminal,
      Err(TrackerError::NotResumable {
        status: IndexingStatus::Completed,
        ..
      })
    ));

    let missing = registry.resume(&ProjectId::from_raw("ghost"), tx).await;
    assert!(matches!(missing, Err(TrackerError::NotFound(_))));
  }

  #[tokio::test(start_paused = true)]
  async fn test_shutdown_cancels_every_tracker() {
    let ctx = TrackerTestContext::new(StartScript::Hang, vec![]);
    let registry = ctx.registry();
    let (tx, _rx) = mpsc::unbounded_channel();

    let a = registry.start("Alpha", tx.clone()).await.expect("start a");
    let b = registry.start("Beta", tx).await.expect("start b");
    registry.shutdown().await;

    for handle in [a, b] {
      let row = ctx.stored(handle.project_id()).await;
      assert_eq!(row.status, IndexingStatus::Error);
      assert_eq!(row.error.as_deref(), Some("cancelled"));
    }
  }
}
