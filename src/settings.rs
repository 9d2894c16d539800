//! Persisted explorer settings.
//!
//! Settings are an explicit record handed to each operation. Persistence is
//! delegated to a [`SettingsStore`], a plain string key-value interface the
//! caller owns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::Processor;

pub const KEY_BINS: &str = "DECT/bins";
pub const KEY_TOLERANCE: &str = "DECT/thresh";
pub const KEY_SLAB_THICKNESS: &str = "DECT/slab";
pub const KEY_PROCESSOR: &str = "DECT/processor";

pub const DEFAULT_BINS: usize = 200;
pub const DEFAULT_TOLERANCE: f64 = 10.0;
pub const DEFAULT_SLAB_THICKNESS: f64 = 10.0;

/// String key-value storage for settings.
pub trait SettingsStore {
    fn value(&self, key: &str) -> Option<String>;
    fn set_value(&mut self, key: &str, value: String);
}

/// In-memory store, serializable as a flat JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl SettingsStore for MemoryStore {
    fn value(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set_value(&mut self, key: &str, value: String) {
        self.values.insert(key.to_owned(), value);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerSettings {
    /// Bins per histogram axis.
    pub bins: usize,
    /// Half-width of every region's matching box.
    pub tolerance: f64,
    /// z spacing written into the histogram image geometry.
    pub slab_thickness: f64,
    pub processor: Processor,
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            bins: DEFAULT_BINS,
            tolerance: DEFAULT_TOLERANCE,
            slab_thickness: DEFAULT_SLAB_THICKNESS,
            processor: Processor::default(),
        }
    }
}

impl ExplorerSettings {
    /// Read settings from `store`, keeping the default for any key that is
    /// missing or does not parse.
    pub fn load(store: &impl SettingsStore) -> Self {
        let defaults = Self::default();
        Self {
            bins: parse_key::<usize>(store, KEY_BINS)
                .filter(|&bins| bins > 0)
                .unwrap_or(defaults.bins),
            tolerance: parse_key::<f64>(store, KEY_TOLERANCE)
                .filter(|t| t.is_finite() && *t >= 0.0)
                .unwrap_or(defaults.tolerance),
            slab_thickness: parse_key::<f64>(store, KEY_SLAB_THICKNESS)
                .filter(|t| t.is_finite() && *t > 0.0)
                .unwrap_or(defaults.slab_thickness),
            processor: store
                .value(KEY_PROCESSOR)
                .and_then(|v| Processor::parse(&v))
                .unwrap_or(defaults.processor),
        }
    }

    pub fn persist(&self, store: &mut impl SettingsStore) {
        store.set_value(KEY_BINS, self.bins.to_string());
        store.set_value(KEY_TOLERANCE, self.tolerance.to_string());
        store.set_value(KEY_SLAB_THICKNESS, self.slab_thickness.to_string());
        store.set_value(KEY_PROCESSOR, self.processor.as_str().to_owned());
    }
}

fn parse_key<T: std::str::FromStr>(store: &impl SettingsStore, key: &str) -> Option<T> {
    store.value(key)?.trim().parse().ok()
}
