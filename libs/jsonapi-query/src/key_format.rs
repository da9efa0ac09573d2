//! Bidirectional mapping between wire key casing and canonical field names.
//!
//! Canonical names are `snake_case` (`country_name`, `iso_currencies`). The
//! formatter raises them to the configured wire convention on output and lowers
//! incoming keys back. Incoming keys are accepted only when they round-trip, so
//! `Title` is not silently taken for `title` under the camelized convention.

use std::fmt;
use std::sync::Arc;

use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use serde::{Deserialize, Serialize};

/// Built-in wire key conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFormat {
    /// `country_name`
    Underscored,
    /// `countryName`
    #[default]
    Camelized,
    /// `country-name`
    Dasherized,
    /// `CountryName`
    UpperCamelized,
}

/// User supplied key convention.
pub trait KeyConvention: Send + Sync + fmt::Debug {
    /// Canonical name to wire name.
    fn format(&self, canonical: &str) -> String;

    /// Wire name to canonical name.
    fn unformat(&self, wire: &str) -> String;
}

#[derive(Clone, Debug)]
enum Convention {
    Builtin(KeyFormat),
    Custom(Arc<dyn KeyConvention>),
}

/// Key formatter bound to one convention for the lifetime of an engine.
#[derive(Clone, Debug)]
pub struct KeyFormatter {
    convention: Convention,
}

impl Default for KeyFormatter {
    fn default() -> Self {
        Self::new(KeyFormat::default())
    }
}

impl KeyFormatter {
    #[must_use]
    pub fn new(format: KeyFormat) -> Self {
        Self {
            convention: Convention::Builtin(format),
        }
    }

    #[must_use]
    pub fn custom(convention: Arc<dyn KeyConvention>) -> Self {
        Self {
            convention: Convention::Custom(convention),
        }
    }

    /// Raise a canonical name to the wire convention.
    #[must_use]
    pub fn format(&self, canonical: &str) -> String {
        match &self.convention {
            Convention::Builtin(KeyFormat::Underscored) => canonical.to_snake_case(),
            Convention::Builtin(KeyFormat::Camelized) => canonical.to_lower_camel_case(),
            Convention::Builtin(KeyFormat::Dasherized) => canonical.to_kebab_case(),
            Convention::Builtin(KeyFormat::UpperCamelized) => canonical.to_upper_camel_case(),
            Convention::Custom(c) => c.format(canonical),
        }
    }

    /// Lower a wire key to its canonical name.
    ///
    /// Returns `None` when the key is not written in the configured convention.
    #[must_use]
    pub fn unformat(&self, wire: &str) -> Option<String> {
        let canonical = match &self.convention {
            Convention::Builtin(_) => wire.to_snake_case(),
            Convention::Custom(c) => c.unformat(wire),
        };
        (self.format(&canonical) == wire).then_some(canonical)
    }
}
