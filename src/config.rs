//! Workspace configuration
//!
//! An optional `purser.toml` next to the document tunes ambient behavior;
//! everything has a default, so most workspaces never need the file.
//!
//! ```toml
//! credentials_file = "secrets/.passwords"
//! default_username = "admin"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::document::LoadOptions;
use crate::error::{PurserError, PurserResult};

pub const CONFIG_FILE: &str = "purser.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Local credential store consulted by `:inject_passwords`.
    pub credentials_file: Option<PathBuf>,
    /// Login user for resources without a `Username` attribute.
    pub default_username: Option<String>,
}

impl Config {
    /// Load `purser.toml` from `dir`; absent file means defaults.
    pub fn load(dir: &Path) -> PurserResult<Config> {
        let path = dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(&path)?;
        toml::from_str(&text).map_err(|e| PurserError::Config {
            path,
            message: e.to_string(),
        })
    }

    pub fn load_options(&self) -> LoadOptions {
        let mut opts = LoadOptions::default();
        if let Some(file) = &self.credentials_file {
            opts.credentials_file = file.clone();
        }
        opts.default_username = self.default_username.clone();
        opts
    }
}
