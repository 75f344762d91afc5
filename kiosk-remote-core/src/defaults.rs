use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};

/// Declared option defaults per widget, keyed by canonical widget name.
///
/// Filled by the module registry while scanning widget sources and shared
/// with the config store and the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct WidgetDefaults {
    inner: Arc<DashMap<String, Map<String, Value>>>,
}

impl WidgetDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, module: impl Into<String>, defaults: Map<String, Value>) {
        self.inner.insert(module.into(), defaults);
    }

    pub fn get(&self, module: &str) -> Option<Map<String, Value>> {
        self.inner.get(module).map(|d| d.value().clone())
    }

    pub fn contains(&self, module: &str) -> bool {
        self.inner.contains_key(module)
    }

    pub fn remove(&self, module: &str) {
        self.inner.remove(module);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl FromIterator<(String, Map<String, Value>)> for WidgetDefaults {
    fn from_iter<T: IntoIterator<Item = (String, Map<String, Value>)>>(iter: T) -> Self {
        let defaults = Self::new();
        for (module, values) in iter {
            defaults.insert(module, values);
        }
        defaults
    }
}
