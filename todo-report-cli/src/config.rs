//! Configuration file loading

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Reporter settings loaded from a TOML file
///
/// ```toml
/// url = "http://localhost:8080/todos"
/// env = "staging"
///
/// [fields]
/// team = "payments"
/// priority = 2
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CliConfig {
    /// Endpoint receiving the report
    pub url: Option<String>,
    /// Environment tag added to reports
    pub env: Option<String>,
    /// Static fields added to every report
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl CliConfig {
    /// Layer command-line values over the file values
    pub fn merge(
        mut self,
        url: Option<String>,
        env: Option<String>,
        fields: Vec<(String, Value)>,
    ) -> Self {
        if url.is_some() {
            self.url = url;
        }
        if env.is_some() {
            self.env = env;
        }
        self.fields.extend(fields);
        self
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<CliConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: CliConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
