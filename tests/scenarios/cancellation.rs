//! Abort signals cancel runs between steps and inside waiting bricks

use crate::helpers::Harness;
use brickrun::core::{BrickInvocation, ExecutionContext, Expression, RunStatus};
use brickrun::execution::{AbortHandle, ExecutionEvent, PipelineError};
use brickrun::trace::TraceOutcome;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_pre_aborted_run_executes_nothing() {
    let harness = Harness::new();
    let (handle, signal) = AbortHandle::new();
    handle.abort();

    let steps = vec![BrickInvocation::new("echo")
        .with_config("message", Expression::literal("never"))];
    let err = harness
        .run_with_signal(&steps, ExecutionContext::new(), signal)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert!(harness.completed_bricks().is_empty());
}

#[tokio::test]
async fn test_abort_interrupts_a_waiting_brick() {
    let harness = Harness::new();
    let (handle, signal) = AbortHandle::new();

    let steps = vec![
        BrickInvocation::new("echo")
            .with_output_key("first")
            .with_config("message", Expression::literal("done")),
        BrickInvocation::new("delay").with_config("ms", Expression::literal(60_000)),
        BrickInvocation::new("echo")
            .with_output_key("after")
            .with_config("message", Expression::literal("never")),
    ];

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.abort();
    });

    let start = std::time::Instant::now();
    let err = harness
        .run_with_signal(&steps, ExecutionContext::new(), signal)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    // Cancelled promptly, not after the 60s sleep
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(harness.completed_bricks(), vec!["echo".to_string()]);

    let events = harness.events.lock().unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, ExecutionEvent::RunCancelled { .. })));
}

#[tokio::test]
async fn test_cancelled_step_is_traced_as_cancelled() {
    let harness = Harness::new();
    let (handle, signal) = AbortHandle::new();
    handle.abort();

    let steps = vec![BrickInvocation::new("delay")
        .with_config("ms", Expression::literal(1000))];

    // Abort fired before the run, so the first between-step check trips
    let err = harness
        .run_with_signal(&steps, ExecutionContext::new(), signal.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));

    // Now run with a live signal that fires mid-delay
    let harness = Harness::new();
    let (handle, signal) = AbortHandle::new();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();
    });
    let output = harness
        .run_with_signal(&steps, ExecutionContext::new(), signal)
        .await;
    assert!(output.is_err());

    let run_id = {
        let events = harness.events.lock().unwrap();
        events
            .iter()
            .find_map(|e| match e {
                ExecutionEvent::RunStarted { run_id, .. } => Some(*run_id),
                _ => None,
            })
            .expect("run started")
    };
    let records = harness.recorder.records_for_run(run_id);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, Some(TraceOutcome::Cancelled));
}

#[tokio::test]
async fn test_abort_reaches_sub_pipelines() {
    let harness = Harness::new();
    let (handle, signal) = AbortHandle::new();

    let body = vec![BrickInvocation::new("delay")
        .with_config("ms", Expression::literal(60_000))];
    let steps = vec![BrickInvocation::new("for-each")
        .with_config("elements", Expression::literal(json!([1, 2, 3])))
        .with_config("body", Expression::Pipeline(body))];

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.abort();
    });

    let start = std::time::Instant::now();
    let err = harness
        .run_with_signal(&steps, ExecutionContext::new(), signal)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_completed_run_state_reflects_cancellation() {
    let harness = Harness::new();
    let (handle, signal) = AbortHandle::new();
    handle.abort();

    let steps = vec![BrickInvocation::new("echo")
        .with_config("message", Expression::literal("x"))];
    let result = harness
        .run_with_signal(&steps, ExecutionContext::new(), signal)
        .await;
    assert!(result.is_err());

    // A successful run for contrast
    let output = harness
        .run(&steps, ExecutionContext::new())
        .await
        .unwrap();
    assert_eq!(output.state.status, RunStatus::Completed);
}
