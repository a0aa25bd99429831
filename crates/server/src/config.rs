use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use skirmish::{ClientConfig, LinkConditions, ServerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoakConfig {
    pub bots: usize,
    /// Simulated seconds to run, forever when zero.
    pub duration_secs: f64,
    pub realtime: bool,
    pub report_interval_secs: f64,
    pub seed: u64,
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            bots: 4,
            duration_secs: 60.0,
            realtime: false,
            report_interval_secs: 5.0,
            seed: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub link: LinkConditions,
    pub soak: SoakConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: FileConfig = toml::from_str(
            r#"
            [server]
            tick_rate = 30

            [link]
            loss_percent = 5.0
            "#,
        )
        .unwrap();

        assert_eq!(config.server.tick_rate, 30);
        assert_eq!(config.server.max_clients, ServerConfig::default().max_clients);
        assert_eq!(config.link.loss_percent, 5.0);
        assert_eq!(config.soak.bots, 4);
    }
}
