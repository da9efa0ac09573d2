//! Configuration for the JSON:API resource engine.

use jsonapi_query::{KeyFormat, RequestLimits};
use serde::Deserialize;

/// Engine configuration, constructed once and handed to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    /// Wire key convention for parameters and documents.
    /// Default: `camelized`
    pub key_format: KeyFormat,

    /// Request size caps enforced during parameter validation.
    pub limits: RequestLimits,
}

impl EngineConfig {
    #[must_use]
    pub fn with_key_format(mut self, key_format: KeyFormat) -> Self {
        self.key_format = key_format;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: RequestLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.key_format, KeyFormat::Camelized);
        assert_eq!(cfg.limits.max_ids, 1000);
        assert_eq!(cfg.limits.max_include_paths, 20);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg: EngineConfig = serde_json::from_value(serde_json::json!({
            "key_format": "dasherized",
            "limits": { "max_sort_fields": 2 }
        }))
        .unwrap();
        assert_eq!(cfg.key_format, KeyFormat::Dasherized);
        assert_eq!(cfg.limits.max_sort_fields, 2);
        assert_eq!(cfg.limits.max_ids, 1000);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let res: Result<EngineConfig, _> =
            serde_json::from_value(serde_json::json!({ "key_fromat": "dasherized" }));
        assert!(res.is_err());
    }
}
