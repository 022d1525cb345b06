//! Local parameter store.
//!
//! Holds the values the user currently sees, the metadata declared by the
//! server and the display order. User edits land here optimistically; only a
//! metadata load or refresh replaces the contents wholesale.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::model::{KeyOrder, Metadata, ParamKey, ParamMeta, ParameterSet, WidgetKind};

/// One display row of the store, in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamRow {
    /// Server-assigned key.
    pub key: ParamKey,
    /// Display name, falling back to the key.
    pub label: SmolStr,
    /// Input control kind.
    pub widget: WidgetKind,
    /// Inclusive lower bound.
    pub min: Option<f64>,
    /// Inclusive upper bound.
    pub max: Option<f64>,
    /// Slider increment; `None` for free-form boxes.
    pub step: Option<f64>,
    /// Current local value.
    pub value: f64,
}

/// Values, metadata and order of every known parameter.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    values: ParameterSet,
    params: IndexMap<ParamKey, ParamMeta>,
    loaded: bool,
}

impl ParameterStore {
    /// An empty store; [`ParameterStore::is_loaded`] stays false until the first
    /// [`ParameterStore::replace_all`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every local value, including keys without metadata.
    #[must_use]
    pub fn get(&self) -> &ParameterSet {
        &self.values
    }

    /// Local value of `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.get(key)
    }

    /// Declared metadata of `key`; `None` for keys the server never declared.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&ParamMeta> {
        self.params.get(key)
    }

    /// Display order.
    #[must_use]
    pub fn order(&self) -> &KeyOrder {
        self.values.order()
    }

    /// Whether metadata has been loaded at least once.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Record a value for `key`. No range checking happens here.
    ///
    /// Returns `false` when the value equals the current one, in which case
    /// nothing changed and nothing should propagate.
    pub fn set(&mut self, key: impl Into<ParamKey>, value: f64) -> bool {
        let key = key.into();
        if self
            .values
            .get(&key)
            .is_some_and(|current| ParameterSet::same_value(current, value))
        {
            return false;
        }
        self.values.insert(key, value);
        true
    }

    /// Replace values, metadata and order with a fresh snapshot.
    pub fn replace_all(&mut self, metadata: Metadata) {
        self.values = metadata.values;
        self.params = metadata.params;
        self.loaded = true;
    }

    /// Current values restricted to keys the server declared metadata for.
    #[must_use]
    pub fn tracked(&self) -> ParameterSet {
        self.values.restricted_to(|key| self.params.contains_key(key))
    }

    /// Ordered display rows for every key with metadata.
    #[must_use]
    pub fn view(&self) -> Vec<ParamRow> {
        self.values
            .iter()
            .filter_map(|(key, value)| {
                let meta = self.params.get(key)?;
                Some(ParamRow {
                    key: key.clone(),
                    label: meta.label(key).into(),
                    widget: meta.widget,
                    min: meta.min,
                    max: meta.max,
                    step: meta.step(),
                    value,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metadata {
        let order: Vec<ParamKey> = vec!["gain".into(), "count".into()];
        Metadata::from_entries(
            vec![
                (
                    "gain".into(),
                    ParamMeta::new(WidgetKind::FloatSlider, Some(0.0), Some(10.0)).with_name("Gain"),
                    2.5,
                ),
                (
                    "count".into(),
                    ParamMeta::new(WidgetKind::IntSlider, Some(1.0), Some(9.0)),
                    3.0,
                ),
            ],
            Some(order.as_slice()),
        )
    }

    #[test]
    fn set_with_current_value_is_a_no_op() {
        let mut store = ParameterStore::new();
        store.replace_all(sample());
        assert!(!store.set("gain", 2.5));
        assert!(store.set("gain", 3.0));
        assert!(!store.set("gain", 3.0));
        assert_eq!(store.value("gain"), Some(3.0));
    }

    #[test]
    fn nan_is_equal_to_nan_for_change_detection() {
        let mut store = ParameterStore::new();
        assert!(store.set("x", f64::NAN));
        assert!(!store.set("x", f64::NAN));
    }

    #[test]
    fn set_does_not_check_bounds() {
        let mut store = ParameterStore::new();
        store.replace_all(sample());
        assert!(store.set("count", 150.0));
        assert_eq!(store.value("count"), Some(150.0));
    }

    #[test]
    fn view_follows_order_and_skips_untracked_keys() {
        let mut store = ParameterStore::new();
        assert!(!store.is_loaded());
        store.replace_all(sample());
        store.set("stray", 1.0);
        let rows = store.view();
        let labels: Vec<&str> = rows.iter().map(|row| row.label.as_str()).collect();
        assert_eq!(labels, ["Gain", "count"]);
        assert_eq!(rows[0].step, Some(0.1));
        assert_eq!(rows[1].step, Some(1.0));
        assert!(store.is_loaded());
        assert!(!store.tracked().contains_key("stray"));
        assert_eq!(store.tracked().len(), 2);
    }
}
