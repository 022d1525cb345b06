//! Bounds validation for parameter edits.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use crate::model::{ParamKey, ParamMeta};
use crate::store::ParameterStore;

/// Which declared constraint a value broke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Violation {
    /// Lower than the declared minimum.
    BelowMin(f64),
    /// Higher than the declared maximum.
    AboveMax(f64),
    /// `NaN` never satisfies a bound.
    NotANumber,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowMin(min) => write!(f, "is below the minimum {min}"),
            Self::AboveMax(max) => write!(f, "is above the maximum {max}"),
            Self::NotANumber => f.write_str("is not a number"),
        }
    }
}

/// A value rejected by [`validate`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("value {value} for '{key}' {violation}")]
pub struct ValidationError {
    /// Key that was edited.
    pub key: ParamKey,
    /// The rejected value.
    pub value: f64,
    /// Which bound was broken.
    pub violation: Violation,
}

/// Check `value` against the inclusive bounds declared in `meta`.
///
/// Missing metadata means the bounds are unknown, which is not an error.
#[must_use]
pub fn validate(key: &str, value: f64, meta: Option<&ParamMeta>) -> Option<ValidationError> {
    let meta = meta?;
    let violation = if value.is_nan() {
        Violation::NotANumber
    } else if let Some(min) = meta.min.filter(|min| value < *min) {
        Violation::BelowMin(min)
    } else if let Some(max) = meta.max.filter(|max| value > *max) {
        Violation::AboveMax(max)
    } else {
        return None;
    };
    Some(ValidationError {
        key: key.into(),
        value,
        violation,
    })
}

/// Current validation state per key. Any entry blocks committing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    errors: IndexMap<ParamKey, ValidationError>,
}

impl ValidationErrors {
    /// No errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the outcome for `key`; returns whether the entry changed.
    pub fn update(&mut self, key: &str, outcome: Option<ValidationError>) -> bool {
        match outcome {
            Some(error) => {
                if self.errors.get(key) == Some(&error) {
                    return false;
                }
                self.errors.insert(key.into(), error);
                true
            }
            None => self.errors.shift_remove(key).is_some(),
        }
    }

    /// Revalidate `key` against the store; returns whether the entry changed.
    pub fn revalidate(&mut self, store: &ParameterStore, key: &str) -> bool {
        let outcome = store
            .value(key)
            .and_then(|value| validate(key, value, store.meta(key)));
        self.update(key, outcome)
    }

    /// Rebuild every entry from the store; returns whether anything changed.
    pub fn recompute(&mut self, store: &ParameterStore) -> bool {
        let mut rebuilt = IndexMap::new();
        for (key, value) in store.get().iter() {
            if let Some(error) = validate(key, value, store.meta(key)) {
                rebuilt.insert(key.clone(), error);
            }
        }
        if rebuilt == self.errors {
            return false;
        }
        self.errors = rebuilt;
        true
    }

    /// Current error of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ValidationError> {
        self.errors.get(key)
    }

    /// Any error blocks committing.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Errors in the order they were first raised.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.values()
    }

    /// Number of keys in error.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// No key is in error.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}
