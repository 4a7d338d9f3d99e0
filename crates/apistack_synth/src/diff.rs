//! Structural comparison of two synthesized graphs.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::SynthResult;
use crate::graph::{LogicalId, ResourceGraph};

/// A node present in both graphs whose properties differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeChange {
    pub id: LogicalId,
    /// JSON pointers of the differing properties, e.g. `/resource/container/image`.
    pub paths: Vec<String>,
}

/// Difference between two graphs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphDiff {
    pub added: Vec<LogicalId>,
    pub removed: Vec<LogicalId>,
    pub changed: Vec<NodeChange>,
}

impl GraphDiff {
    /// Compare `before` against `after`.
    pub fn between(before: &ResourceGraph, after: &ResourceGraph) -> SynthResult<Self> {
        let mut diff = GraphDiff::default();

        for (id, node) in &before.resources {
            match after.resources.get(id) {
                None => diff.removed.push(id.clone()),
                Some(other) if other != node => {
                    let mut paths = Vec::new();
                    compare(&serde_json::to_value(node)?, &serde_json::to_value(other)?, "", &mut paths);
                    diff.changed.push(NodeChange { id: id.clone(), paths });
                }
                Some(_) => {}
            }
        }
        for id in after.resources.keys() {
            if !before.resources.contains_key(id) {
                diff.added.push(id.clone());
            }
        }

        Ok(diff)
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn changed_ids(&self) -> Vec<&LogicalId> {
        self.changed.iter().map(|c| &c.id).collect()
    }
}

fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn compare(a: &Value, b: &Value, path: &str, out: &mut Vec<String>) {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            let mut keys: Vec<&String> = x.keys().chain(y.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                let child = format!("{}/{}", path, escape(key));
                match (x.get(key), y.get(key)) {
                    (Some(l), Some(r)) => compare(l, r, &child, out),
                    _ => out.push(child),
                }
            }
        }
        (Value::Array(x), Value::Array(y)) if x.len() == y.len() => {
            for (i, (l, r)) in x.iter().zip(y).enumerate() {
                compare(l, r, &format!("{}/{}", path, i), out);
            }
        }
        _ if a != b => out.push(path.to_string()),
        _ => {}
    }
}

impl fmt::Display for GraphDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "no differences");
        }
        for id in &self.added {
            writeln!(f, "+ {}", id)?;
        }
        for id in &self.removed {
            writeln!(f, "- {}", id)?;
        }
        for change in &self.changed {
            writeln!(f, "~ {}", change.id)?;
            for path in &change.paths {
                writeln!(f, "    {}", path)?;
            }
        }
        Ok(())
    }
}
