use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};
use crate::types::Signature;

/// repository configuration stored in config.toml
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// identity recorded as author and committer
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub init: InitConfig,
    #[serde(default)]
    pub merge: MergeConfig,
}

impl Config {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    /// signature built from the configured user
    pub fn identity(&self) -> Signature {
        Signature::new(&self.user.name, &self.user.email)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub name: String,
    pub email: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            name: "grove".to_string(),
            email: "grove@localhost".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitConfig {
    /// branch HEAD points at in a fresh repository
    pub default_branch: String,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            default_branch: "master".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// width of the `<<<<<<<` / `=======` / `>>>>>>>` conflict markers
    pub marker_size: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self { marker_size: 7 }
    }
}
