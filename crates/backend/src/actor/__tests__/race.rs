//! Launcher vs poller: first terminal signal wins, exactly once.

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use tokio::time::{Instant, sleep};

  use crate::actor::__tests__::helpers::*;
  use crate::{
    actor::TrackerEvent,
    domain::{
      project::ProjectId,
      state::{INITIAL_STEP, IndexingStatus},
    },
  };

  #[tokio::test(start_paused = true)]
  async fn test_launcher_error_before_poller_success() {
    let ctx = TrackerTestContext::new(
      StartScript::Fail {
        after: ms(50),
        message: "quota exceeded".into(),
      },
      vec![(ms(100), completed(Some(stats(1, 2, 3))))],
    );

    let (handle, rx) = ctx.start("Acme").await;
    let events = collect(rx).await;
    let id = ProjectId::from_raw("acme");

    assert_eq!(
      terminal_events(&events),
      vec![&TrackerEvent::Error {
        project_id: id.clone(),
        message: "quota exceeded".into(),
      }]
    );

    // The poller's later success must not overwrite the error
    sleep(ms(500)).await;
    let row = ctx.stored(&id).await;
    assert_eq!(row.status, IndexingStatus::Error);
    assert_eq!(row.error.as_deref(), Some("quota exceeded"));
    assert_eq!(handle.state(), row);
    assert_eq!(ctx.backend.start_calls(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_poller_success_before_launcher_error() {
    let ctx = TrackerTestContext::new(
      StartScript::Fail {
        after: ms(100),
        message: "quota exceeded".into(),
      },
      vec![(ms(0), indexing(40, "Embedding")), (ms(50), completed(Some(stats(4, 20, 1))))],
    );

    let (handle, rx) = ctx.start("Acme").await;
    let events = collect(rx).await;
    let id = ProjectId::from_raw("acme");

    assert_eq!(
      terminal_events(&events),
      vec![&TrackerEvent::Complete {
        project_id: id.clone(),
        stats: stats(4, 20, 1),
      }]
    );

    // Let the rejected start call resolve; its result is ignored
    sleep(ms(500)).await;
    let row = ctx.stored(&id).await;
    assert_eq!(row.status, IndexingStatus::Completed);
    assert_eq!(row.percent, 100);
    assert_eq!(row.error, None);
    assert_eq!(row.stats, Some(stats(4, 20, 1)));
    assert!(handle.is_finished());
  }

  #[tokio::test(start_paused = true)]
  async fn test_launcher_success_completes_with_confirmed_stats() {
    let ctx = TrackerTestContext::new(
      StartScript::Succeed {
        after: ms(120),
        stats: None,
      },
      vec![(ms(25), indexing(30, "Parsing emails")), (ms(110), completed(Some(stats(7, 70, 2))))],
    );

    let (_handle, rx) = ctx.start("Acme").await;
    let events = collect(rx).await;

    assert_eq!(
      progress_of(&events),
      vec![(0, INITIAL_STEP.to_string()), (30, "Parsing emails".to_string())]
    );
    assert_eq!(
      events.last(),
      Some(&TrackerEvent::Complete {
        project_id: ProjectId::from_raw("acme"),
        stats: stats(7, 70, 2),
      })
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_launcher_success_without_confirmation_still_completes() {
    let ctx = TrackerTestContext::new(
      StartScript::Succeed {
        after: ms(60),
        stats: Some(stats(1, 1, 0)),
      },
      vec![(ms(0), Reply::Fail)],
    );

    let (_handle, rx) = ctx.start("Acme").await;
    let events = collect(rx).await;

    assert_eq!(
      events.last(),
      Some(&TrackerEvent::Complete {
        project_id: ProjectId::from_raw("acme"),
        stats: stats(1, 1, 0),
      })
    );
    assert_eq!(ctx.stored(&ProjectId::from_raw("acme")).await.status, IndexingStatus::Completed);
  }

  #[tokio::test(start_paused = true)]
  async fn test_exactly_one_terminal_event() {
    // Both sides fail; the status endpoint reports at t=0, the start call at t=50
    let ctx = TrackerTestContext::new(
      StartScript::Fail {
        after: ms(50),
        message: "quota exceeded".into(),
      },
      vec![(ms(0), errored("mailbox locked"))],
    );

    let (_handle, rx) = ctx.start("Acme").await;
    let events = collect(rx).await;

    // The status endpoint reported first, so its error wins
    assert_eq!(
      terminal_events(&events),
      vec![&TrackerEvent::Error {
        project_id: ProjectId::from_raw("acme"),
        message: "mailbox locked".into(),
      }]
    );
    assert!(events.last().is_some_and(TrackerEvent::is_terminal));

    sleep(ms(500)).await;
    let row = ctx.stored(&ProjectId::from_raw("acme")).await;
    assert_eq!(row.error.as_deref(), Some("mailbox locked"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_poller_times_out_when_every_poll_fails() {
    let ctx = TrackerTestContext::new(StartScript::Hang, vec![(ms(0), Reply::Fail)]);
    let started = Instant::now();

    let (_handle, rx) = ctx.start("Acme").await;
    let events = collect(rx).await;

    assert!(started.elapsed() >= test_config().max_duration);
    assert_eq!(
      terminal_events(&events),
      vec![&TrackerEvent::Error {
        project_id: ProjectId::from_raw("acme"),
        message: "timed out".into(),
      }]
    );
    assert!(ctx.backend.status_calls() > 10);

    let row = ctx.stored(&ProjectId::from_raw("acme")).await;
    assert_eq!(row.status, IndexingStatus::Error);
    assert_eq!(row.error.as_deref(), Some("timed out"));
  }
}
