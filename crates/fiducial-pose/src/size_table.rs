use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Physical marker side length per id, with a default for unlisted ids.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SizeTable {
    default_size_m: f64,
    overrides: BTreeMap<u32, f64>,
}

fn check(what: impl FnOnce() -> String, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidSize {
            what: what(),
            value,
        })
    }
}

impl SizeTable {
    pub fn new(default_size_m: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            default_size_m: check(|| "default".to_string(), default_size_m)?,
            overrides: BTreeMap::new(),
        })
    }

    pub fn with_override(mut self, id: u32, size_m: f64) -> Result<Self, ConfigError> {
        self.overrides
            .insert(id, check(|| format!("for id {id}"), size_m)?);
        Ok(self)
    }

    /// Side length for `id`; never fails.
    #[inline]
    pub fn size_for(&self, id: u32) -> f64 {
        self.overrides
            .get(&id)
            .copied()
            .unwrap_or(self.default_size_m)
    }

    pub fn default_size(&self) -> f64 {
        self.default_size_m
    }

    pub fn overrides(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.overrides.iter().map(|(&id, &s)| (id, s))
    }
}
