//! Template string interpolation
//!
//! Renders `{{ path }}` placeholders against a context. Both `{{ @foo.x }}`
//! and `{{ foo.x }}` resolve: a bare root name falls back to its
//! `@`-prefixed context binding.

use crate::core::ExecutionContext;
use crate::render::path::{parse_path, walk, PathSegment};
use crate::render::RenderError;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("placeholder regex"))
}

/// Resolve a parsed path against the context, trying the bare root name
/// first and its `@`-prefixed form second. Returns the value and whether
/// the resolved root is secret-sourced.
pub(crate) fn resolve_in_context<'a>(
    ctx: &'a ExecutionContext,
    segments: &[PathSegment],
) -> Option<(&'a Value, bool)> {
    let root = match segments.first()? {
        PathSegment::Key(name) => name,
        PathSegment::Index(_) => return None,
    };

    let mut candidates = vec![root.clone()];
    if !root.starts_with('@') {
        candidates.push(format!("@{}", root));
    }

    for candidate in &candidates {
        if let Some(value) = ctx.get(candidate) {
            let resolved = walk_from(value, &segments[1..])?;
            return Some((resolved, ctx.is_secret(candidate)));
        }
    }
    None
}

fn walk_from<'a>(root: &'a Value, rest: &[PathSegment]) -> Option<&'a Value> {
    if rest.is_empty() {
        Some(root)
    } else {
        walk(root, rest)
    }
}

/// Render a template against the context.
///
/// Returns the rendered string and whether any placeholder resolved to a
/// secret-sourced variable. With `validate`, a missing placeholder path is
/// a `VariableNotDefined` error; otherwise it renders as the empty string.
pub fn render_template(
    template: &str,
    ctx: &ExecutionContext,
    validate: bool,
) -> Result<(String, bool), RenderError> {
    let re = placeholder_regex();
    let mut output = String::with_capacity(template.len());
    let mut last_end = 0;
    let mut touched_secret = false;

    for captures in re.captures_iter(template) {
        let whole = captures.get(0).expect("match group 0");
        let expr = captures.get(1).expect("match group 1").as_str();

        let gap = &template[last_end..whole.start()];
        reject_stray_braces(template, gap)?;
        output.push_str(gap);
        last_end = whole.end();

        let segments = parse_path(expr)
            .map_err(|e| RenderError::Template(format!("bad placeholder '{}': {}", expr, e)))?;

        match resolve_in_context(ctx, &segments) {
            Some((value, secret)) => {
                touched_secret |= secret;
                output.push_str(&value_to_text(value));
            }
            None if validate => {
                return Err(RenderError::VariableNotDefined {
                    path: expr.to_string(),
                });
            }
            None => {}
        }
    }
    let tail = &template[last_end..];
    reject_stray_braces(template, tail)?;
    output.push_str(tail);

    Ok((output, touched_secret))
}

// Checked against the template text between placeholders, never the
// rendered output; substituted values may legitimately contain braces
fn reject_stray_braces(template: &str, text: &str) -> Result<(), RenderError> {
    if text.contains("{{") || text.contains("}}") {
        return Err(RenderError::Template(format!(
            "unbalanced braces in template: {}",
            template
        )));
    }
    Ok(())
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
