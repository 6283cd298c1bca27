//! Unused-key report.
//!
//! Each command reads a fixed set of JSON-pointer prefixes. A leaf under any
//! of them is consumed; any other leaf is unused (usually a typo such as
//! `allocation/greedy/max_iteration`). Callers choose whether that is a
//! warning or an error.
//!
//! - prefix "/allocation/greedy" consumes "/allocation/greedy/tie_break"
//! - "/weights" does NOT consume "/weights_extra"

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandScope {
    /// One weight vector, one allocator.
    Allocate,
    /// Every strategy in a bundle, then comparison and recommendation.
    Run,
    /// History backtest, optionally allocating at the last close.
    Backtest,
}

impl CommandScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandScope::Allocate => "ALLOCATE",
            CommandScope::Run => "RUN",
            CommandScope::Backtest => "BACKTEST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub scope: String,
    /// Sorted, unique.
    pub consumed_prefixes: Vec<String>,
    /// Sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Prefixes each command actually reads through `Settings`.
pub fn consumed_pointers_for_scope(scope: CommandScope) -> &'static [&'static str] {
    match scope {
        CommandScope::Allocate => &[
            "/allocation/budget_tolerance",
            "/allocation/integer",
            "/allocation/greedy",
        ],
        CommandScope::Run => &["/allocation", "/weights", "/recommendation"],
        CommandScope::Backtest => &[
            "/allocation/budget_tolerance",
            "/allocation/integer",
            "/allocation/greedy",
            "/backtest",
        ],
    }
}

/// `Warn` always returns the report; `Fail` errors when any leaf is unused.
pub fn report_unused_keys(
    scope: CommandScope,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = consumed_pointers_for_scope(scope)
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();
    let consumed_prefixes: Vec<String> = consumed.into_iter().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|lp| !consumed_prefixes.iter().any(|cp| is_prefix_pointer(cp, lp)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        scope: scope.as_str().to_string(),
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS (scope={}): {} unused config leaf key(s) detected. \
            Remove them or check their spelling. First few: {}",
            report.scope,
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

/// Leading "/", no trailing "/" unless it is the root.
fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, vv) in map {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_pointers(vv, &format!("{prefix}/{i}"), out);
            }
        }
        // The root object itself is not a key.
        Value::Object(_) if prefix.is_empty() => {}
        _ => out.push(if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }),
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    let take = items.iter().take(n).cloned().collect::<Vec<_>>();
    format!("{:?}", take)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_needs_segment_boundary() {
        assert!(is_prefix_pointer("/weights", "/weights/clean_cutoff"));
        assert!(is_prefix_pointer("/weights", "/weights"));
        assert!(!is_prefix_pointer("/weights", "/weights_extra/x"));
        assert!(is_prefix_pointer("/", "/anything"));
    }

    #[test]
    fn normalizes_pointers() {
        assert_eq!(normalize_pointer("backtest/"), "/backtest");
        assert_eq!(normalize_pointer(""), "/");
    }

    #[test]
    fn leaves_escape_and_index() {
        let v = serde_json::json!({"a/b": {"c~d": 1}, "list": ["x", "y"], "empty": {}});
        let mut out = Vec::new();
        collect_leaf_pointers(&v, "", &mut out);
        out.sort();
        assert_eq!(out, vec!["/a~1b/c~0d", "/empty", "/list/0", "/list/1"]);
    }

    #[test]
    fn empty_config_is_clean_everywhere() {
        for scope in [CommandScope::Allocate, CommandScope::Run, CommandScope::Backtest] {
            let r = report_unused_keys(scope, &serde_json::json!({}), UnusedKeyPolicy::Fail)
                .unwrap();
            assert!(r.is_clean());
        }
    }
}
