//! Compile Settings
//!
//! Tunables for the traversal engine. Settings are plain data: they can be
//! built in code or loaded from JSON and are validated before use.
//!
//! ```rust,ignore
//! use strata_core::settings::CompileSettings;
//!
//! let settings = CompileSettings {
//!     max_depth: 64,
//!     ..Default::default()
//! };
//!
//! let from_disk = CompileSettings::from_json(r#"{ "stateSort": false }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{Result, StrataError};

/// Upper bound accepted for [`CompileSettings::max_depth`].
pub const MAX_SUPPORTED_DEPTH: usize = 4096;

/// Configuration of the compiler and renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileSettings {
    /// Maximum tree depth, which is also the capacity of every core stack.
    /// Exceeding it aborts the pass (it is how cycles surface).
    pub max_depth: usize,

    /// State-sort the display list after structural changes.
    /// When disabled the list stays in traversal order.
    pub state_sort: bool,

    /// Compile only dirty branches. When disabled every structural pass walks
    /// the full tree.
    pub incremental: bool,

    /// Skip binds whose state id matches the previously bound core.
    pub dedup_binds: bool,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            max_depth: 256,
            state_sort: true,
            incremental: true,
            dedup_binds: true,
        }
    }
}

impl CompileSettings {
    /// Parses settings from JSON; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(StrataError::InvalidSettings(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(StrataError::InvalidSettings(format!(
                "max_depth {} exceeds {MAX_SUPPORTED_DEPTH}",
                self.max_depth
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let settings = CompileSettings::from_json(r#"{ "maxDepth": 32 }"#).unwrap();
        assert_eq!(settings.max_depth, 32);
        assert!(settings.state_sort);
        assert!(settings.incremental);
    }

    #[test]
    fn zero_depth_is_rejected() {
        let err = CompileSettings::from_json(r#"{ "maxDepth": 0 }"#).unwrap_err();
        assert!(matches!(err, StrataError::InvalidSettings(_)));
    }
}
