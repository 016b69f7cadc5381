//! Slash-separated element paths with an optional trailing attribute selector.
//!
//! Grammar: `step ("/" step)* ("[@" name ("='" value "'")? "]")?`
//! where a step is a tag name, `*` (any child) or `.` (the element itself).
//! Each step matches direct children in document order, like ElementTree's
//! `findall`.

use super::Element;
use crate::error::PathError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Current,
    Any,
    Tag(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    value: Option<String>,
}

impl AttrSelector {
    fn matches(&self, element: &Element) -> bool {
        match (element.attribute(&self.name), &self.value) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// A parsed path, resolved against an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ElementPath {
    raw: String,
    steps: Vec<Step>,
    selector: Option<AttrSelector>,
}

impl ElementPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let trimmed = raw.trim();
        let (path_part, selector) = split_selector(trimmed)?;

        let path_part = path_part.strip_prefix("./").unwrap_or(path_part);
        let steps = if path_part.is_empty() {
            vec![Step::Current]
        } else {
            path_part
                .split('/')
                .map(|segment| parse_step(trimmed, segment))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            raw: trimmed.to_string(),
            steps,
            selector,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// All matching descendants of `root`, in document order. Never fails;
    /// no match at any depth yields an empty vector.
    pub fn resolve<'a>(&self, root: &'a Element) -> Vec<&'a Element> {
        let mut current = vec![root];
        for step in &self.steps {
            let mut next = Vec::new();
            for element in current {
                match step {
                    Step::Current => next.push(element),
                    Step::Any => next.extend(element.children()),
                    Step::Tag(name) => {
                        next.extend(element.children().filter(|child| child.name() == name))
                    }
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }

        if let Some(selector) = &self.selector {
            current.retain(|element| selector.matches(element));
        }
        current
    }

    /// First match in document order.
    pub fn first<'a>(&self, root: &'a Element) -> Option<&'a Element> {
        self.resolve(root).into_iter().next()
    }
}

/// Resolve an unparsed path. Malformed paths match nothing.
pub fn resolve<'a>(root: &'a Element, path: &str) -> Vec<&'a Element> {
    match ElementPath::parse(path) {
        Ok(parsed) => parsed.resolve(root),
        Err(err) => {
            tracing::debug!(path, error = %err, "Ignoring malformed element path");
            Vec::new()
        }
    }
}

fn split_selector(raw: &str) -> Result<(&str, Option<AttrSelector>), PathError> {
    let Some(open) = raw.rfind("[@") else {
        if raw.contains('[') || raw.contains(']') {
            return Err(selector_error(raw, "expected '[@name]' at the end of the path"));
        }
        return Ok((raw, None));
    };

    let body = raw[open + 2..]
        .strip_suffix(']')
        .ok_or_else(|| selector_error(raw, "selector must end the path"))?;

    let (name, value) = match body.split_once('=') {
        Some((name, quoted)) => {
            let quoted = quoted.trim();
            let value = quoted
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .or_else(|| quoted.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                .ok_or_else(|| selector_error(raw, "attribute value must be quoted"))?;
            (name.trim(), Some(value.to_string()))
        }
        None => (body.trim(), None),
    };

    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(selector_error(raw, "missing attribute name"));
    }

    let path_part = &raw[..open];
    if path_part.contains('[') || path_part.contains(']') {
        return Err(selector_error(raw, "only one trailing selector is supported"));
    }

    Ok((
        path_part,
        Some(AttrSelector {
            name: name.to_string(),
            value,
        }),
    ))
}

fn parse_step(raw: &str, segment: &str) -> Result<Step, PathError> {
    match segment.trim() {
        "" => Err(PathError::EmptyStep(raw.to_string())),
        "." => Ok(Step::Current),
        "*" => Ok(Step::Any),
        name => Ok(Step::Tag(name.to_string())),
    }
}

fn selector_error(path: &str, reason: &str) -> PathError {
    PathError::Selector {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

impl FromStr for ElementPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ElementPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ElementPath> for String {
    fn from(path: ElementPath) -> Self {
        path.raw
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
