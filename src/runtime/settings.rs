use std::path::Path;

use crate::config;
use crate::error::{Error, Result};

/// Load and validate settings from `path` (or the resolved default path) and
/// the environment.
pub fn load_settings(path: Option<&Path>) -> Result<config::Settings> {
    let loaded = match path {
        Some(path) => config::Settings::load_from(Some(path)),
        None => config::Settings::load(),
    };
    let settings = loaded.map_err(|e| Error::Config(e.to_string()))?;
    settings.validate().map_err(Error::Config)?;
    Ok(settings)
}
