// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow execution

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Reserved slot holding the initial workflow inputs
pub const INPUTS_KEY: &str = "inputs";

/// Read-only lookup of dotted paths, shared by conditions and templates
pub trait Scope {
    /// Resolve a dotted path (e.g. `fetch.body.items.0`)
    fn lookup(&self, path: &str) -> Option<&Value>;
}

/// Step id -> output map, plus the initial-inputs slot.
///
/// Owned by one orchestrator for the duration of one execution. Each step
/// writes only its own slot.
#[derive(Debug, Clone, Default)]
pub struct ExecutionState {
    slots: HashMap<String, Map<String, Value>>,
}

impl ExecutionState {
    /// Create a state seeded with the workflow inputs
    pub fn new(inputs: Map<String, Value>) -> Self {
        let mut slots = HashMap::new();
        slots.insert(INPUTS_KEY.to_string(), inputs);
        Self { slots }
    }

    /// Create an empty state
    pub fn empty() -> Self {
        Self::default()
    }

    /// Store a step's outputs in its own slot
    pub fn record(&mut self, step_id: &str, outputs: Map<String, Value>) {
        self.slots.insert(step_id.to_string(), outputs);
    }

    /// Get a slot's output map
    pub fn get(&self, key: &str) -> Option<&Map<String, Value>> {
        self.slots.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Convert state to a JSON object keyed by slot
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.slots
                .iter()
                .map(|(k, v)| (k.clone(), Value::Object(v.clone())))
                .collect(),
        )
    }
}

impl Scope for ExecutionState {
    fn lookup(&self, path: &str) -> Option<&Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let slot = self.slots.get(head)?;
        match rest {
            // A bare slot name has no single JSON value to hand out
            None => None,
            Some(rest) => lookup_in_map(slot, rest),
        }
    }
}

impl Scope for Map<String, Value> {
    fn lookup(&self, path: &str) -> Option<&Value> {
        lookup_in_map(self, path)
    }
}

fn lookup_in_map<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = map.get(first)?;
    for part in parts {
        current = step_into(current, part)?;
    }
    Some(current)
}

fn step_into<'a>(value: &'a Value, part: &str) -> Option<&'a Value> {
    match value {
        Value::Object(obj) => obj.get(part),
        Value::Array(arr) => part.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    }
}
