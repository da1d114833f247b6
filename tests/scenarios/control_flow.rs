//! Control-flow bricks: branching and iteration over sub-pipelines

use crate::helpers::{assert_run_completed, Harness};
use brickrun::core::{BrickInvocation, ExecutionContext, Expression};
use serde_json::json;

#[tokio::test]
async fn test_if_else_takes_the_right_branch() {
    let then_steps = vec![BrickInvocation::new("echo")
        .with_config("message", Expression::literal("then branch"))];
    let else_steps = vec![BrickInvocation::new("echo")
        .with_config("message", Expression::literal("else branch"))];

    for (condition, expected) in [(json!(true), "then branch"), (json!(false), "else branch")] {
        let harness = Harness::new();
        let steps = vec![BrickInvocation::new("if-else")
            .with_config("condition", Expression::literal(condition))
            .with_config("then", Expression::Pipeline(then_steps.clone()))
            .with_config("else", Expression::Pipeline(else_steps.clone()))];

        let output = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
        assert_eq!(output.last_output, json!({ "message": expected }));
    }
}

#[tokio::test]
async fn test_if_else_without_else_is_a_noop() {
    let harness = Harness::new();
    let steps = vec![BrickInvocation::new("if-else")
        .with_config("condition", Expression::literal(false))
        .with_config(
            "then",
            Expression::Pipeline(vec![BrickInvocation::new("fail")]),
        )];

    let output = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
    assert_eq!(output.last_output, json!(null));
}

#[tokio::test]
async fn test_for_each_binds_element_per_iteration() {
    let harness = Harness::new();
    let body = vec![BrickInvocation::new("echo")
        .with_config("message", Expression::var("@element"))];
    let steps = vec![BrickInvocation::new("for-each")
        .with_output_key("looped")
        .with_config("elements", Expression::literal(json!([1, "two", null])))
        .with_config("body", Expression::Pipeline(body))];

    let output = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
    assert_eq!(
        output.last_output,
        json!([
            { "message": 1 },
            { "message": "two" },
            { "message": null }
        ])
    );
    // One body execution per element, plus the for-each itself
    assert_eq!(harness.completed_bricks().len(), 4);
}

#[tokio::test]
async fn test_sub_pipeline_sees_enclosing_context() {
    let harness = Harness::new();
    let body = vec![BrickInvocation::new("concat").with_config(
        "values",
        Expression::literal(json!([
            { "kind": "var", "value": "@prefix.message" },
            { "kind": "var", "value": "@element" }
        ])),
    )];
    let steps = vec![
        BrickInvocation::new("echo")
            .with_output_key("prefix")
            .with_config("message", Expression::literal("item-")),
        BrickInvocation::new("for-each")
            .with_config("elements", Expression::literal(json!(["a", "b"])))
            .with_config("body", Expression::Pipeline(body)),
    ];

    let output = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
    assert_eq!(output.last_output, json!(["item-a", "item-b"]));
}

#[tokio::test]
async fn test_nested_loops_shadow_element() {
    let harness = Harness::new();
    let inner = vec![BrickInvocation::new("echo")
        .with_config("message", Expression::var("@element"))];
    let outer = vec![BrickInvocation::new("for-each")
        .with_config("elements", Expression::literal(json!(["x", "y"])))
        .with_config("body", Expression::Pipeline(inner))];
    let steps = vec![BrickInvocation::new("for-each")
        .with_config("elements", Expression::literal(json!([1, 2])))
        .with_config("body", Expression::Pipeline(outer))];

    let output = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
    // Inner @element shadows the outer one in both outer iterations
    assert_eq!(
        output.last_output,
        json!([
            [{ "message": "x" }, { "message": "y" }],
            [{ "message": "x" }, { "message": "y" }]
        ])
    );
}

#[tokio::test]
async fn test_sub_pipeline_failure_propagates() {
    let harness = Harness::new();
    let body = vec![BrickInvocation::new("fail")
        .with_config("message", Expression::literal("inner failure"))];
    let steps = vec![BrickInvocation::new("for-each")
        .with_config("elements", Expression::literal(json!([1])))
        .with_config("body", Expression::Pipeline(body))];

    let err = harness
        .run(&steps, ExecutionContext::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("inner failure"));
}

#[tokio::test]
async fn test_deeply_nested_branches() {
    // 60 levels of if-else nesting must not blow the stack
    let mut steps = vec![BrickInvocation::new("echo")
        .with_config("message", Expression::literal("bottom"))];
    for _ in 0..60 {
        steps = vec![BrickInvocation::new("if-else")
            .with_config("condition", Expression::literal(true))
            .with_config("then", Expression::Pipeline(steps))];
    }

    let harness = Harness::new();
    let output = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
    assert_eq!(output.last_output, json!({ "message": "bottom" }));
}
