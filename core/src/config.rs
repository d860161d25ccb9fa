use crate::query::FilterCaseSensitivity;
use serde::{Deserialize, Serialize};

/// Engine-wide defaults. Missing fields take their defaults, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Parameter name used for implicit-parameter expressions and generated filters
    pub parameter_name: String,
    pub case_sensitivity: FilterCaseSensitivity,
    pub cache_compiled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self { Self { parameter_name: "it".to_string(), case_sensitivity: FilterCaseSensitivity::Default, cache_compiled: true } }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> { serde_json::from_str(json) }
}
