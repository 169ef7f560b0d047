use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    advice::AdviceConfig, alert::AlertConfig, classifier::ClassifierConfig, tracker::TrackerConfig,
};

/// Everything tunable in one TOML file. Defaults match the shipped
/// thresholds, so an absent or partial file is fine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub classifier: ClassifierConfig,
    pub tracker: TrackerConfig,
    pub alert: AlertConfig,
    pub advice: AdviceConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("failed to write config to {}", path.display()))
    }
}
