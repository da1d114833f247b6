//! Variable path parsing and traversal
//!
//! Paths address values in the execution context using dotted keys,
//! numeric bracket indices, and quoted bracket keys:
//! `@foo.bar[2]["odd key"]`.

use serde_json::Value;

/// One step in a parsed variable path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key (dotted or quoted-bracket form)
    Key(String),
    /// Array index (numeric bracket form)
    Index(usize),
}

/// Error parsing a variable path
#[derive(Debug, thiserror::Error)]
#[error("invalid path '{path}': {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: String,
}

impl PathError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse a path string into segments.
///
/// The leading `@` (when present) stays attached to the first segment, so
/// `@foo.bar` parses to `[Key("@foo"), Key("bar")]` and resolves against
/// the context's `@`-prefixed root names.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, PathError> {
    if path.is_empty() {
        return Err(PathError::new(path, "empty path"));
    }

    let mut segments = Vec::new();
    let mut chars = path.chars().peekable();
    let mut current = String::new();

    // The first segment may carry the @ sigil
    if chars.peek() == Some(&'@') {
        current.push('@');
        chars.next();
    }

    // Set after a closing bracket; only '.', '[', or the end may follow
    let mut after_bracket = false;

    loop {
        match chars.next() {
            None => {
                if !after_bracket {
                    push_key(path, &mut segments, &mut current)?;
                }
                break;
            }
            Some('.') => {
                if after_bracket {
                    // Separator after a bracket, no key to flush
                    after_bracket = false;
                } else {
                    push_key(path, &mut segments, &mut current)?;
                }
                if chars.peek().is_none() {
                    return Err(PathError::new(path, "trailing '.'"));
                }
            }
            Some('[') => {
                if !current.is_empty() {
                    push_key(path, &mut segments, &mut current)?;
                } else if segments.is_empty() {
                    return Err(PathError::new(path, "path cannot start with an index"));
                }
                segments.push(parse_bracket(path, &mut chars)?);
                after_bracket = true;
            }
            Some(c) => {
                if after_bracket {
                    return Err(PathError::new(path, "expected '.' or '[' after ']'"));
                }
                current.push(c);
            }
        }
    }

    if segments.is_empty() {
        return Err(PathError::new(path, "empty path"));
    }
    Ok(segments)
}

fn push_key(path: &str, segments: &mut Vec<PathSegment>, current: &mut String) -> Result<(), PathError> {
    if current.is_empty() {
        return Err(PathError::new(path, "empty segment"));
    }
    if *current == "@" {
        return Err(PathError::new(path, "empty segment after '@'"));
    }
    segments.push(PathSegment::Key(std::mem::take(current)));
    Ok(())
}

fn parse_bracket(
    path: &str,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<PathSegment, PathError> {
    match chars.peek() {
        Some(&quote @ ('"' | '\'')) => {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next() {
                    None => return Err(PathError::new(path, "unterminated quoted key")),
                    Some(c) if c == quote => break,
                    Some(c) => key.push(c),
                }
            }
            match chars.next() {
                Some(']') => Ok(PathSegment::Key(key)),
                _ => Err(PathError::new(path, "expected ']' after quoted key")),
            }
        }
        Some(c) if c.is_ascii_digit() => {
            let mut digits = String::new();
            while let Some(c) = chars.peek() {
                if c.is_ascii_digit() {
                    digits.push(*c);
                    chars.next();
                } else {
                    break;
                }
            }
            match chars.next() {
                Some(']') => digits
                    .parse::<usize>()
                    .map(PathSegment::Index)
                    .map_err(|_| PathError::new(path, "index out of range")),
                _ => Err(PathError::new(path, "expected ']' after index")),
            }
        }
        _ => Err(PathError::new(path, "expected digit or quote after '['")),
    }
}

/// Walk a JSON value along the given segments.
///
/// Returns `None` as soon as a segment does not resolve, including a
/// numeric index into a non-array or an out-of-bounds index.
pub fn walk<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        current = match segment {
            PathSegment::Key(key) => current.as_object()?.get(key)?,
            PathSegment::Index(idx) => current.as_array()?.get(*idx)?,
        };
    }
    Some(current)
}
