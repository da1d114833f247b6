//! Steps run strictly in declaration order, one at a time

use crate::helpers::{assert_run_completed, Harness};
use brickrun::core::{BrickInvocation, ExecutionContext, Expression};
use brickrun::registry::{Brick, BrickError, BrickOptions, BrickRegistry};
use brickrun::render::BrickArgs;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn test_steps_run_in_declaration_order() {
    let harness = Harness::new();
    let steps = vec![
        BrickInvocation::new("echo")
            .with_output_key("a")
            .with_config("message", Expression::literal("first")),
        BrickInvocation::new("concat")
            .with_output_key("b")
            .with_config("values", Expression::literal(json!(["x", "y"]))),
        BrickInvocation::new("echo")
            .with_output_key("c")
            .with_config("message", Expression::literal("last")),
    ];

    assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
    assert_eq!(
        harness.completed_bricks(),
        vec!["echo".to_string(), "concat".to_string(), "echo".to_string()]
    );
}

/// A brick that records when it starts and finishes, to prove no overlap
struct Sequenced {
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

#[async_trait]
impl Brick for Sequenced {
    fn id(&self) -> &str {
        "sequenced"
    }

    async fn run(&self, _args: BrickArgs, _options: &BrickOptions) -> Result<Value, BrickError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Value::Null)
    }
}

#[tokio::test]
async fn test_no_step_overlap() {
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));

    let registry = BrickRegistry::new();
    registry
        .register(Arc::new(Sequenced {
            active: Arc::clone(&active),
            max_active: Arc::clone(&max_active),
        }))
        .unwrap();

    let harness = Harness::with_registry(registry);
    let steps: Vec<BrickInvocation> =
        (0..5).map(|_| BrickInvocation::new("sequenced")).collect();

    assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
    assert_eq!(max_active.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_runs_do_not_share_context() {
    // Two runs over the same harness must not see each other's bindings
    let harness = Arc::new(Harness::new());
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for tag in ["left", "right"] {
        let steps = vec![
            BrickInvocation::new("echo")
                .with_output_key("tagged")
                .with_config("message", Expression::literal(tag)),
            BrickInvocation::new("echo")
                .with_config("message", Expression::var("@tagged.message")),
        ];
        let harness = Arc::clone(&harness);
        let order = Arc::clone(&order);
        handles.push(tokio::spawn(async move {
            let output =
                assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
            order.lock().unwrap().push(tag);
            assert_eq!(output.last_output, json!({ "message": tag }));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(order.lock().unwrap().len(), 2);
}
