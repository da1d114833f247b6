//! Cross-context messaging and remote platform access

use crate::helpers::{assert_run_completed, Harness};
use brickrun::core::{BrickInvocation, ExecutionContext, Expression};
use brickrun::execution::{AbortSignal, PipelineRunner};
use brickrun::messenger::{
    InProcessBus, Messenger, MessengerError, MethodTable, SerializedError, Target,
};
use brickrun::platform::{
    register_platform_methods, LocalPlatform, PlatformProtocol, RemotePlatform,
};
use brickrun::registry::builtin_registry;
use serde_json::{json, Value};
use std::sync::Arc;

#[tokio::test]
async fn test_request_reply_between_named_endpoints() {
    let bus = Arc::new(InProcessBus::new());

    let table = MethodTable::new();
    table
        .register("math.add", |params: Value| async move {
            let a = params["a"].as_i64().unwrap_or(0);
            let b = params["b"].as_i64().unwrap_or(0);
            Ok(json!(a + b))
        })
        .unwrap();
    bus.attach("worker", Arc::new(table));

    let messenger = Messenger::new(bus);
    let reply = messenger
        .call(Target::named("worker"), "math.add", json!({ "a": 2, "b": 40 }))
        .await
        .unwrap();
    assert_eq!(reply, json!(42));
}

#[tokio::test]
async fn test_target_missing_and_invalidated() {
    let bus = Arc::new(InProcessBus::new());
    let messenger = Messenger::new(Arc::clone(&bus) as Arc<dyn brickrun::messenger::Transport>);

    let err = messenger
        .call(Target::named("ghost"), "ping", Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, MessengerError::TargetMissing { .. }));

    bus.attach("page", Arc::new(MethodTable::new()));
    bus.invalidate("page");
    let err = messenger
        .call(Target::named("page"), "ping", Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, MessengerError::ContextInvalidated { .. }));
}

#[tokio::test]
async fn test_remote_errors_survive_serialization() {
    let bus = Arc::new(InProcessBus::new());
    let table = MethodTable::new();
    table
        .register("always.fails", |_| async {
            Err(SerializedError::new("QuotaError", "limit reached").with_data(json!({ "limit": 10 })))
        })
        .unwrap();
    bus.attach("svc", Arc::new(table));

    let messenger = Messenger::new(bus);
    let err = messenger
        .call(Target::named("svc"), "always.fails", Value::Null)
        .await
        .unwrap_err();
    match err {
        MessengerError::Remote(e) => {
            assert_eq!(e.name, "QuotaError");
            assert_eq!(e.message, "limit reached");
            assert_eq!(e.data, Some(json!({ "limit": 10 })));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_pipeline_runs_against_a_remote_platform() {
    // The "host" context owns the real platform; the pipeline talks to it
    // through the messenger
    let host_platform = Arc::new(LocalPlatform::new());
    let table = MethodTable::new();
    register_platform_methods(&table, Arc::clone(&host_platform) as Arc<dyn PlatformProtocol>)
        .unwrap();

    let bus = Arc::new(InProcessBus::new());
    bus.attach("host", Arc::new(table));

    let remote = RemotePlatform::connect(Messenger::new(bus), Target::named("host"))
        .await
        .unwrap();

    let runner = Arc::new(PipelineRunner::new(
        Arc::new(builtin_registry()),
        Arc::new(remote),
    ));
    let steps = vec![
        BrickInvocation::new("set-state")
            .with_config("key", Expression::literal("greeting"))
            .with_config("value", Expression::literal("hello")),
        BrickInvocation::new("alert")
            .with_config("message", Expression::literal("state written")),
        BrickInvocation::new("get-state")
            .with_output_key("read")
            .with_config("key", Expression::literal("greeting")),
    ];

    let output = runner
        .run(&steps, ExecutionContext::new(), AbortSignal::never())
        .await
        .unwrap();

    // Effects landed on the host's platform, not some local shadow
    assert_eq!(output.last_output, json!("hello"));
    assert_eq!(host_platform.alerts(), vec!["state written".to_string()]);
}

#[tokio::test]
async fn test_window_target_is_preserved_through_config() {
    use brickrun::core::{ModConfig, WindowTarget};

    let yaml = r#"
name: "Framed mod"
steps:
  - brick: "echo"
    window: "top"
    output_key: "first"
    config:
      message: "hi"
  - brick: "echo"
    window: "broadcast"
    output_key: "second"
    config:
      message: "everyone"
"#;
    let config = ModConfig::from_yaml(yaml).unwrap();
    let steps = config.to_steps().unwrap();
    assert_eq!(steps[0].window, Some(WindowTarget::Top));
    assert_eq!(steps[1].window, Some(WindowTarget::Broadcast));

    // Window hints don't change in-process execution
    let harness = Harness::new();
    assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
}
