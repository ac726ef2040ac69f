//! Presentation preferences kept beside the tree.
//!
//! Structure preferences hang per-node attributes (a column's `width`) off a
//! layout without touching the nodes. Theme preferences are flat key/value
//! pairs for the whole (user, profile), such as the selected `skin`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// Attribute name of a column width.
pub const WIDTH: &str = "width";

/// Theme parameter naming the selected skin.
pub const SKIN: &str = "skin";

/// Per-node structure attributes, keyed by node id then attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructurePreferences {
    entries: BTreeMap<NodeId, BTreeMap<String, String>>,
}

impl StructurePreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: &NodeId, attribute: &str) -> Option<&str> {
        self.entries
            .get(node)
            .and_then(|attrs| attrs.get(attribute))
            .map(String::as_str)
    }

    pub fn set(&mut self, node: &NodeId, attribute: &str, value: impl Into<String>) {
        self.entries
            .entry(node.clone())
            .or_default()
            .insert(attribute.to_string(), value.into());
    }

    /// Drops every attribute of `node`.
    pub fn remove_node(&mut self, node: &NodeId) {
        self.entries.remove(node);
    }

    /// Keeps only the entries whose node satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&NodeId) -> bool) {
        self.entries.retain(|node, _| keep(node));
    }

    pub fn width(&self, node: &NodeId) -> Option<&str> {
        self.get(node, WIDTH)
    }

    pub fn set_width(&mut self, node: &NodeId, width: impl Into<String>) {
        self.set(node, WIDTH, width);
    }

    /// Flattened `(node, attribute, value)` triples in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &str, &str)> {
        self.entries.iter().flat_map(|(node, attrs)| {
            attrs
                .iter()
                .map(move |(name, value)| (node, name.as_str(), value.as_str()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Theme parameters for one (user, profile).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThemePreferences {
    params: BTreeMap<String, String>,
}

impl ThemePreferences {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.params.insert(name.to_string(), value.into());
    }

    pub fn skin(&self) -> Option<&str> {
        self.get(SKIN)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
