//! Configuration types for the element array.

use serde::Deserialize;

/// Top-level array configuration. Loaded from TOML/JSON at runtime or
/// built in code by a driver.
#[derive(Debug, Clone, Deserialize)]
pub struct ArrayConfig {
    /// Use local (per-element) time stepping instead of global slabs.
    /// Requires a self-starting integrator.
    #[serde(default)]
    pub local_time_stepping: bool,

    /// Component name used in array-component identities.
    #[serde(default = "default_component_name")]
    pub component_name: String,
}

fn default_component_name() -> String {
    "element_array".to_string()
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            local_time_stepping: false,
            component_name: default_component_name(),
        }
    }
}
