//! Keyed numeric parameters for the pose predictors.
//!
//! Lookups and updates of keys that were never defined fail loudly
//! instead of silently defaulting; the prediction numerics depend on
//! every parameter being set deliberately, so a typo in a key must
//! surface immediately.

use std::collections::BTreeMap;

use crate::error::Error;

/// Named scalar parameters with fail-fast access.
#[derive(Debug, Clone)]
pub struct SimParams {
    values: BTreeMap<String, f64>,
}

impl Default for SimParams {
    fn default() -> Self {
        let mut p = Self {
            values: BTreeMap::new(),
        };
        // how strongly the last observed motion is extrapolated
        p.define("prediction_gain", 1.0);
        // per-frame clamps on the extrapolated delta
        p.define("max_translation_step", 25.0);
        p.define("max_rotation_step", 0.5);
        p
    }
}

impl SimParams {
    /// Parameter set with no keys at all, for callers building one up
    /// from an external source.
    pub fn empty() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Introduce a parameter (or overwrite an existing one).
    pub fn define(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Value of a defined parameter.
    pub fn get(&self, name: &str) -> Result<f64, Error> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownParam(name.to_string()))
    }

    /// Update a parameter that already exists.
    pub fn set(&mut self, name: &str, value: f64) -> Result<(), Error> {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::UnknownParam(name.to_string())),
        }
    }

    /// Defined parameter names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}
