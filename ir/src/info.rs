//! Sparse per-node metadata with inheritance across rebuilds.
//!
//! One column per key, each column a map from node id to value plus an
//! optional inheritance policy. Transformers use this to carry provenance
//! through rewrites.

use std::collections::{BTreeMap, BTreeSet};

use crate::node::NodeId;

/// How a key's values propagate when a node is rebuilt into another circuit.
#[derive(Clone, Copy, Debug)]
pub struct InheritPolicy {
    /// Carry the value only onto nodes that are outputs of the new circuit.
    pub only_output: bool,
    /// Flatten nested merge groups when combining values from several parents.
    pub merge_flatten: bool,
    /// Drop repeated values when combining from several parents.
    pub merge_unique: bool,
}

impl Default for InheritPolicy {
    fn default() -> Self {
        Self {
            only_output: false,
            merge_flatten: true,
            merge_unique: true,
        }
    }
}

/// A metadata value attached to a node.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum InfoValue {
    Text(String),
    Index(i64),
    /// Values combined from multiple source nodes.
    Merged(Vec<InfoValue>),
}

impl From<&str> for InfoValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for InfoValue {
    fn from(value: i64) -> Self {
        Self::Index(value)
    }
}

#[derive(Clone, Debug, Default)]
struct Column {
    policy: Option<InheritPolicy>,
    values: BTreeMap<u32, InfoValue>,
}

/// Per-node, per-key metadata store owned by a circuit.
#[derive(Clone, Debug, Default)]
pub struct NodeInfoStore {
    columns: BTreeMap<String, Column>,
}

impl NodeInfoStore {
    pub fn set(&mut self, node: NodeId, key: &str, value: InfoValue) {
        self.columns
            .entry(key.to_string())
            .or_default()
            .values
            .insert(node.raw(), value);
    }

    pub fn get(&self, node: NodeId, key: &str) -> Option<&InfoValue> {
        self.columns.get(key)?.values.get(&node.raw())
    }

    pub fn delete(&mut self, node: NodeId, key: &str) {
        if let Some(column) = self.columns.get_mut(key) {
            column.values.remove(&node.raw());
            if column.values.is_empty() && column.policy.is_none() {
                self.columns.remove(key);
            }
        }
    }

    /// Keys that have a value for the given node.
    pub fn keys_of(&self, node: NodeId) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, column)| column.values.contains_key(&node.raw()))
            .map(|(key, _)| key.as_str())
            .collect()
    }

    pub fn set_policy(&mut self, key: &str, policy: InheritPolicy) {
        self.columns.entry(key.to_string()).or_default().policy = Some(policy);
    }

    pub fn policy(&self, key: &str) -> Option<InheritPolicy> {
        self.columns.get(key)?.policy
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn clear(&mut self) {
        self.columns.clear();
    }

    /// Copies one node's inheritable entries onto a node of another store.
    /// Keys without an inheritance policy do not propagate.
    pub fn inherit_to(
        &self,
        src: NodeId,
        target: &mut NodeInfoStore,
        dst: NodeId,
        is_output: bool,
    ) {
        for (key, column) in &self.columns {
            let Some(policy) = column.policy else { continue };
            let Some(value) = column.values.get(&src.raw()) else {
                continue;
            };
            target.set_policy(key, policy);
            if !policy.only_output || is_output {
                target.set(dst, key, value.clone());
            }
        }
    }

    /// Merges several nodes' inheritable entries onto one target node,
    /// honoring the per-key flatten/unique flags.
    pub fn inherit_to_from_many(
        &self,
        srcs: &[NodeId],
        target: &mut NodeInfoStore,
        dst: NodeId,
        is_output: bool,
    ) {
        for (key, column) in &self.columns {
            let Some(policy) = column.policy else { continue };

            let mut values: Vec<InfoValue> = Vec::new();
            for src in srcs {
                let Some(value) = column.values.get(&src.raw()) else {
                    continue;
                };
                match value {
                    InfoValue::Merged(parts) if policy.merge_flatten => {
                        values.extend(parts.iter().cloned())
                    }
                    other => values.push(other.clone()),
                }
            }
            if values.is_empty() {
                continue;
            }
            if policy.merge_unique {
                let mut seen = BTreeSet::new();
                values.retain(|v| seen.insert(v.clone()));
            }
            // keep a lone pre-merged group as is
            let merged = if values.len() == 1 && matches!(values[0], InfoValue::Merged(_)) {
                values.pop().expect("non-empty")
            } else {
                InfoValue::Merged(values)
            };

            target.set_policy(key, policy);
            if !policy.only_output || is_output {
                target.set(dst, key, merged);
            }
        }
    }

    pub(crate) fn retain_nodes(&mut self, keep: &BTreeSet<u32>) {
        self.columns.retain(|_, column| {
            column.values.retain(|raw, _| keep.contains(raw));
            !column.values.is_empty() || column.policy.is_some()
        });
    }

    pub(crate) fn remap(&mut self, map: &BTreeMap<u32, u32>) {
        for column in self.columns.values_mut() {
            column.values = column
                .values
                .iter()
                .filter_map(|(raw, value)| map.get(raw).map(|new| (*new, value.clone())))
                .collect();
        }
    }
}
