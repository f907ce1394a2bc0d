use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;
use url::Url;

use crate::auth::Token;
use crate::error::{Result, TfsError};

const LOCAL_SETTINGS_FILE: &str = "tfs-query.toml";

/// Contents of a `tfs-query.toml` settings file.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(rename = "defaultCollectionURI")]
    pub default_collection_uri: Option<String>,
    #[serde(rename = "outputFolder")]
    pub output_folder: Option<PathBuf>,
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        info!("Loaded settings from {}", path.display());
        Self::from_toml(&text)
    }

    /// Loads `explicit` if given, otherwise the first settings file found in
    /// the working directory or the user config directory.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::default_locations().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load(&path),
            None => {
                debug!("No settings file found, relying on command line and environment");
                Ok(Self::default())
            }
        }
    }

    fn default_locations() -> Vec<PathBuf> {
        let mut locations = vec![PathBuf::from(LOCAL_SETTINGS_FILE)];
        if let Some(mut dir) = dirs::config_dir() {
            dir.push("tfs-query");
            dir.push("config.toml");
            locations.push(dir);
        }
        locations
    }
}

/// Values from the command line or environment; these win over the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub collection_uri: Option<String>,
    pub output_folder: Option<PathBuf>,
    pub token: Option<String>,
}

#[derive(Debug)]
pub struct Config {
    pub collection_uri: Url,
    pub token: Option<Token>,
    output_folder: Option<PathBuf>,
}

impl Config {
    pub fn resolve(settings: Settings, overrides: Overrides) -> Result<Self> {
        let raw_uri = overrides
            .collection_uri
            .or(settings.default_collection_uri)
            .ok_or_else(|| TfsError::Config("defaultCollectionURI is not set".to_string()))?;

        let collection_uri = Url::parse(&raw_uri).map_err(|e| {
            TfsError::Config(format!("Invalid defaultCollectionURI '{raw_uri}': {e}"))
        })?;
        if collection_uri.cannot_be_a_base() {
            return Err(TfsError::Config(format!(
                "defaultCollectionURI must be an http(s) address, got '{raw_uri}'"
            )));
        }

        Ok(Self {
            collection_uri,
            token: overrides
                .token
                .filter(|t| !t.is_empty())
                .map(|t| Token::from(t.as_str())),
            output_folder: overrides.output_folder.or(settings.output_folder),
        })
    }

    /// Only the changeset export needs an output folder.
    pub fn output_folder(&self) -> Result<&Path> {
        self.output_folder
            .as_deref()
            .ok_or_else(|| TfsError::Config("outputFolder is not set".to_string()))
    }
}
