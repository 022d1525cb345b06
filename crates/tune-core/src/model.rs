//! Parameter keys, metadata and ordered parameter sets.

#![allow(missing_docs)]

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

/// Unique, server-assigned parameter identifier.
pub type ParamKey = SmolStr;

/// Presentation hint declared by the server for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WidgetKind {
    IntSlider,
    FloatSlider,
    #[default]
    FloatBox,
}

impl WidgetKind {
    /// Parse the wire name of a widget (`intslider`, `floatslider`, `floatbox`).
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "intslider" => Some(Self::IntSlider),
            "floatslider" => Some(Self::FloatSlider),
            "floatbox" => Some(Self::FloatBox),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IntSlider => "intslider",
            Self::FloatSlider => "floatslider",
            Self::FloatBox => "floatbox",
        }
    }

    #[must_use]
    pub fn is_slider(self) -> bool {
        matches!(self, Self::IntSlider | Self::FloatSlider)
    }

    /// Increment used when nudging a value of this kind between `min` and `max`.
    #[must_use]
    pub fn step(self, min: f64, max: f64) -> Option<f64> {
        match self {
            Self::IntSlider => Some(1.0),
            Self::FloatSlider => Some((max - min) / 100.0),
            Self::FloatBox => None,
        }
    }
}

/// Per-parameter metadata as declared by the server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamMeta {
    pub display_name: Option<SmolStr>,
    pub widget: WidgetKind,
    /// Inclusive lower bound; `None` is unbounded.
    pub min: Option<f64>,
    /// Inclusive upper bound; `None` is unbounded.
    pub max: Option<f64>,
}

impl ParamMeta {
    #[must_use]
    pub fn new(widget: WidgetKind, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            display_name: None,
            widget,
            min,
            max,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<SmolStr>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Human readable label, falling back to the key.
    #[must_use]
    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        self.display_name.as_deref().unwrap_or(key)
    }

    /// Slider bounds; absent bounds fall back to `0..=100`.
    #[must_use]
    pub fn slider_range(&self) -> (f64, f64) {
        (self.min.unwrap_or(0.0), self.max.unwrap_or(100.0))
    }

    #[must_use]
    pub fn step(&self) -> Option<f64> {
        let (min, max) = self.slider_range();
        self.widget.step(min, max)
    }
}

/// Explicit display order of parameter keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyOrder(Vec<ParamKey>);

impl KeyOrder {
    #[must_use]
    pub fn new(keys: Vec<ParamKey>) -> Self {
        Self(keys)
    }

    /// Build the display order from the server's declared order and the keys
    /// that actually carry parameters.
    ///
    /// Declared keys without a parameter are dropped. Parameters the
    /// declaration does not mention are appended in lexicographic order. With
    /// no declaration at all the whole order is lexicographic.
    pub fn resolve<'a>(
        declared: Option<&[ParamKey]>,
        known: impl IntoIterator<Item = &'a ParamKey>,
    ) -> Self {
        let mut known: Vec<ParamKey> = known.into_iter().cloned().collect();
        known.sort();
        let Some(declared) = declared else {
            debug!("no parameter order declared, ordering {} keys by name", known.len());
            return Self(known);
        };
        let mut keys = Vec::with_capacity(known.len());
        for key in declared {
            if known.binary_search(key).is_err() {
                debug!("dropping ordered key '{key}' without a parameter");
                continue;
            }
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        for key in known {
            if !keys.contains(&key) {
                debug!("appending unordered parameter '{key}'");
                keys.push(key);
            }
        }
        Self(keys)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamKey> {
        self.0.iter()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|candidate| candidate == key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[ParamKey] {
        &self.0
    }
}

/// Values keyed by parameter plus the order in which they are observed.
///
/// Iteration follows the explicit order first; keys that are not part of it
/// follow in insertion order. Equality compares values key by key and treats
/// `NaN` as equal to itself; the order is not part of equality.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    values: IndexMap<ParamKey, f64>,
    order: KeyOrder,
}

impl ParameterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_order(order: KeyOrder) -> Self {
        Self {
            values: IndexMap::new(),
            order,
        }
    }

    /// Whether two values are the same for synchronization purposes.
    #[must_use]
    pub fn same_value(left: f64, right: f64) -> bool {
        left == right || (left.is_nan() && right.is_nan())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<ParamKey>, value: f64) -> Option<f64> {
        self.values.insert(key.into(), value)
    }

    #[must_use]
    pub fn order(&self) -> &KeyOrder {
        &self.order
    }

    pub fn set_order(&mut self, order: KeyOrder) {
        self.order = order;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamKey, f64)> {
        let ordered = self
            .order
            .iter()
            .filter_map(|key| self.values.get_key_value(key))
            .map(|(key, value)| (key, *value));
        let rest = self
            .values
            .iter()
            .filter(|(key, _)| !self.order.contains(key))
            .map(|(key, value)| (key, *value));
        ordered.chain(rest)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ParamKey> {
        self.iter().map(|(key, _)| key)
    }

    /// Keys whose value differs from `baseline` or that `baseline` lacks.
    #[must_use]
    pub fn changed_keys(&self, baseline: &ParameterSet) -> Vec<ParamKey> {
        self.iter()
            .filter(|(key, value)| {
                baseline
                    .get(key)
                    .is_none_or(|known| !Self::same_value(known, *value))
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Copy of this set keeping only the keys accepted by `keep`.
    #[must_use]
    pub fn restricted_to(&self, mut keep: impl FnMut(&str) -> bool) -> ParameterSet {
        let mut restricted = ParameterSet::with_order(self.order.clone());
        for (key, value) in self.iter() {
            if keep(key) {
                restricted.insert(key.clone(), value);
            }
        }
        restricted
    }
}

impl PartialEq for ParameterSet {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self.values.iter().all(|(key, value)| {
                other
                    .get(key)
                    .is_some_and(|theirs| Self::same_value(*value, theirs))
            })
    }
}

impl<K: Into<ParamKey>> FromIterator<(K, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let values: IndexMap<ParamKey, f64> =
            iter.into_iter().map(|(key, value)| (key.into(), value)).collect();
        let order = KeyOrder::new(values.keys().cloned().collect());
        Self { values, order }
    }
}

/// One metadata snapshot as served by the remote: values, per-key metadata
/// and the display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub values: ParameterSet,
    pub params: IndexMap<ParamKey, ParamMeta>,
}

impl Metadata {
    /// Assemble a snapshot from decoded entries and the declared order.
    #[must_use]
    pub fn from_entries(
        entries: impl IntoIterator<Item = (ParamKey, ParamMeta, f64)>,
        declared_order: Option<&[ParamKey]>,
    ) -> Self {
        let mut params = IndexMap::new();
        let mut values = IndexMap::new();
        for (key, meta, value) in entries {
            values.insert(key.clone(), value);
            params.insert(key, meta);
        }
        let order = KeyOrder::resolve(declared_order, params.keys());
        let mut set = ParameterSet::with_order(order);
        for (key, value) in values {
            set.insert(key, value);
        }
        Self {
            values: set,
            params,
        }
    }

    #[must_use]
    pub fn order(&self) -> &KeyOrder {
        self.values.order()
    }
}
