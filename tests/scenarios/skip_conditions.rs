//! Step conditions: falsy skips, truthy runs, missing variables skip

use crate::helpers::{assert_run_completed, Harness};
use brickrun::core::{BrickInvocation, ExecutionContext, Expression};
use serde_json::json;

fn echo_with_condition(condition: Expression) -> BrickInvocation {
    BrickInvocation::new("echo")
        .with_condition(condition)
        .with_config("message", Expression::literal("ran"))
}

#[tokio::test]
async fn test_falsy_condition_skips_step() {
    for falsy in [json!(false), json!(null), json!(0), json!("")] {
        let harness = Harness::new();
        let steps = vec![echo_with_condition(Expression::literal(falsy))];

        let output = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
        assert_eq!(harness.skipped_bricks(), vec!["echo".to_string()]);
        assert!(harness.completed_bricks().is_empty());
        // A skipped step contributes no output and no binding
        assert_eq!(output.last_output, json!(null));
        assert!(output.context.get("@echo").is_none());
    }
}

#[tokio::test]
async fn test_truthy_condition_runs_step() {
    for truthy in [json!(true), json!(1), json!("yes"), json!([]), json!({})] {
        let harness = Harness::new();
        let steps = vec![echo_with_condition(Expression::literal(truthy))];

        assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
        assert_eq!(harness.completed_bricks(), vec!["echo".to_string()]);
    }
}

#[tokio::test]
async fn test_missing_condition_variable_skips_instead_of_failing() {
    let harness = Harness::new();
    let steps = vec![echo_with_condition(Expression::var("@never.bound"))];

    assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
    assert_eq!(harness.skipped_bricks(), vec!["echo".to_string()]);
}

#[tokio::test]
async fn test_condition_sees_earlier_outputs() {
    let harness = Harness::new();
    let yaml = r#"
name: "Conditional mod"
steps:
  - brick: "echo"
    output_key: "gate"
    config:
      message: { kind: var, value: "@input.enabled" }
  - brick: "echo"
    output_key: "guarded"
    condition: { kind: var, value: "@gate.message" }
    config:
      message: "made it"
"#;

    let output = assert_run_completed(harness.run_yaml(yaml, &[("enabled", "true")]).await);
    assert_eq!(output.last_output, json!({ "message": "made it" }));

    let harness = Harness::new();
    assert_run_completed(harness.run_yaml(yaml, &[("enabled", "false")]).await);
    assert_eq!(harness.skipped_bricks(), vec!["echo".to_string()]);
}

#[tokio::test]
async fn test_skip_does_not_break_later_steps() {
    let harness = Harness::new();
    let steps = vec![
        echo_with_condition(Expression::literal(false)),
        BrickInvocation::new("echo")
            .with_output_key("after")
            .with_config("message", Expression::literal("still here")),
    ];

    let output = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
    assert_eq!(output.last_output, json!({ "message": "still here" }));
    assert_eq!(output.state.completed_steps, 2);
}
