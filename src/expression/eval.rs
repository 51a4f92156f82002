//! Expression evaluation against a parameter map.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use regex::Regex;

use super::parser::{Node, Placeholder};
use crate::value::{is_present, to_text, Params};

/// Compiled placeholder patterns, keyed by pattern source.
///
/// An invalid pattern is remembered as `None` and never matches.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: RwLock<HashMap<String, Option<Arc<Regex>>>>,
}

impl PatternCache {
    pub fn get(&self, pattern: &str) -> Option<Arc<Regex>> {
        if let Some(found) = self
            .compiled
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(pattern)
        {
            return found.clone();
        }

        let compiled = match Regex::new(&format!("^(?:{})$", pattern)) {
            Ok(re) => Some(Arc::new(re)),
            Err(e) => {
                tracing::warn!("Invalid expression pattern '{}': {}", pattern, e);
                None
            }
        };

        self.compiled
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(pattern.to_string(), compiled.clone());
        compiled
    }

    pub fn len(&self) -> usize {
        self.compiled.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Evaluate one level of nodes whose raw text is `source`.
///
/// Placeholders of this level are resolved first; the first failing one vetoes
/// the whole level (sibling optionals included). Optionals are then evaluated
/// independently and spliced in where they appeared.
pub(crate) fn evaluate_nodes(
    source: &str,
    nodes: &[Node],
    params: &Params,
    patterns: &PatternCache,
) -> String {
    if !source.contains('{') {
        return source.trim().to_string();
    }

    let mut substitutions = Vec::new();
    for node in nodes {
        if let Node::Placeholder(placeholder) = node {
            match resolve(placeholder, params, patterns) {
                Some(text) => substitutions.push(text),
                None => return String::new(),
            }
        }
    }

    let mut substitutions = substitutions.into_iter();
    let mut output = String::with_capacity(source.len());
    for node in nodes {
        match node {
            Node::Literal(text) => output.push_str(text),
            Node::Placeholder(_) => {
                if let Some(text) = substitutions.next() {
                    output.push_str(&text);
                }
            }
            Node::Optional(segment) => {
                output.push_str(&evaluate_nodes(
                    &segment.source,
                    &segment.nodes,
                    params,
                    patterns,
                ));
            }
        }
    }

    output.trim().to_string()
}

/// Substitution text for a placeholder, or `None` when its condition fails.
fn resolve(placeholder: &Placeholder, params: &Params, patterns: &PatternCache) -> Option<String> {
    let value = params.get(&placeholder.name);
    let text = value.map(to_text).unwrap_or_default();

    let holds = match &placeholder.pattern {
        Some(pattern) => patterns
            .get(pattern)
            .map(|re| re.is_match(&text))
            .unwrap_or(false),
        None => value.map(is_present).unwrap_or(false),
    };

    if holds == placeholder.negate {
        return None;
    }

    Some(if placeholder.empty { String::new() } else { text })
}
