//! Synthesis options
//!
//! Options can be built in code or loaded from a TOML document:
//!
//! ```toml
//! type_name_suffix = "Proxy"
//! notifier_suffix = "Notifier"
//! notify_callback = "OnPropertyChanged"
//! enforce_generic_constraints = true
//! ```

use serde::Deserialize;
use surrogate_sdk::{ProxyError, ProxyResult};

/// Options shared by every build a registry performs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynthesisOptions {
    /// Infix of interception proxy type names (`Name$Proxy3`)
    #[serde(default = "default_type_name_suffix")]
    pub type_name_suffix: String,

    /// Infix of change-notification wrapper type names (`Name$Notifier4`)
    #[serde(default = "default_notifier_suffix")]
    pub notifier_suffix: String,

    /// Callback change-notification wrappers invoke on every change,
    /// unless the prototype names its own
    #[serde(default = "default_notify_callback")]
    pub notify_callback: String,

    /// Check closed generic arguments against declared constraints on every call
    #[serde(default = "default_enforce_generic_constraints")]
    pub enforce_generic_constraints: bool,
}

fn default_type_name_suffix() -> String {
    "Proxy".to_string()
}

fn default_notifier_suffix() -> String {
    "Notifier".to_string()
}

fn default_notify_callback() -> String {
    "OnPropertyChanged".to_string()
}

fn default_enforce_generic_constraints() -> bool {
    true
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            type_name_suffix: default_type_name_suffix(),
            notifier_suffix: default_notifier_suffix(),
            notify_callback: default_notify_callback(),
            enforce_generic_constraints: default_enforce_generic_constraints(),
        }
    }
}

impl SynthesisOptions {
    /// Parse and validate options from TOML
    pub fn from_toml_str(source: &str) -> ProxyResult<Self> {
        let options: SynthesisOptions =
            toml::from_str(source).map_err(|e| ProxyError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Check that every name option is a usable identifier
    pub fn validate(&self) -> ProxyResult<()> {
        for (key, value) in [
            ("type_name_suffix", &self.type_name_suffix),
            ("notifier_suffix", &self.notifier_suffix),
            ("notify_callback", &self.notify_callback),
        ] {
            if !is_identifier(value) {
                return Err(ProxyError::Config(format!(
                    "{} must be a non-empty identifier, got {:?}",
                    key, value
                )));
            }
        }
        Ok(())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}
