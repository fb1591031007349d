//! Engine configuration.
//!
//! Every field has a default, so an empty document is a valid configuration.
//!
//! ```
//! use scopebind::config::EngineConfig;
//! use scopebind::BindingMode;
//!
//! let config = EngineConfig::from_json_str(r#"{ "default_input_mode": "one_way" }"#).unwrap();
//! assert_eq!(config.default_input_mode, BindingMode::OneWay);
//! assert_eq!(config.flush_ttl, 10);
//! ```

use serde::Deserialize;

use crate::descriptor::BindingMode;
use crate::error::{BindingError, Result};

/// Default number of re-entrant change flushes before aborting.
pub const DEFAULT_FLUSH_TTL: u32 = 10;

/// Tunables shared by every installation attached to one cycle context.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum nesting of change flushes, and of hook rounds for one
    /// component within a flush, before [`BindingError::InfiniteChangeLoop`].
    pub flush_ttl: u32,
    /// Mode given to inputs declared without a mode marker.
    pub default_input_mode: BindingMode,
    /// Drop a pending change whose value returned to its cycle-start value.
    pub suppress_net_zero_changes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flush_ttl: DEFAULT_FLUSH_TTL,
            default_input_mode: BindingMode::TwoWay,
            suppress_net_zero_changes: true,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| BindingError::Config(e.to_string()))?;
        config.validate()
    }

    /// Parse and validate a TOML configuration document.
    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| BindingError::Config(e.to_string()))?;
        config.validate()
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(self) -> Result<Self> {
        if self.flush_ttl == 0 {
            return Err(BindingError::Config("flush_ttl must be at least 1".into()));
        }
        Ok(self)
    }
}
