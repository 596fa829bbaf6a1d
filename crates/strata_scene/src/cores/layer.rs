//! Render layers.
//!
//! A layer orders its subtree against the rest of the scene. Within each
//! transparency pass, lower priorities draw first; the default layer has
//! priority 0. A disabled layer emits nothing.

use serde::Deserialize;
use strata_core::{Category, ConfigError};

use super::BindingHasher;

/// Priorities travel in 16 bits of the state key.
pub const PRIORITY_RANGE: std::ops::RangeInclusive<i32> = (i16::MIN as i32)..=(i16::MAX as i32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerState {
    pub priority: i32,
    pub enabled: bool,
}

impl Default for LayerState {
    fn default() -> Self {
        Self {
            priority: 0,
            enabled: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LayerParams {
    priority: Option<i32>,
    enabled: Option<bool>,
}

impl LayerState {
    #[must_use]
    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }

    pub fn from_params(params: &serde_json::Value) -> Result<Self, ConfigError> {
        let p: LayerParams = super::decode_params("layer", params)?;
        let d = Self::default();
        let state = Self {
            priority: p.priority.unwrap_or(d.priority),
            enabled: p.enabled.unwrap_or(d.enabled),
        };
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if PRIORITY_RANGE.contains(&self.priority) {
            Ok(())
        } else {
            Err(ConfigError::InvalidValue {
                category: Category::Layer,
                field: "priority",
                reason: format!("{} is outside [{}, {}]", self.priority, i16::MIN, i16::MAX),
            })
        }
    }

    /// Priority with the sign bias removed, so that it sorts as unsigned.
    #[must_use]
    pub fn sort_bits(&self) -> u16 {
        let clamped = self.priority.clamp(i32::from(i16::MIN), i32::from(i16::MAX));
        (clamped - i32::from(i16::MIN)) as u16
    }

    /// `enabled` is left out: toggling it recompiles the branch.
    #[must_use]
    pub fn binding_hash(&self) -> u64 {
        BindingHasher::new(Category::Layer).int(self.priority).finish()
    }
}
