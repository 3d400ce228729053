//! Where the persisted configuration lives, and how it is loaded and saved.

use std::path::{Path, PathBuf};

use log::info;

use crate::config::Configuration;
use crate::error::{Error, Result};

/// Operating system family, as far as file locations are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

/// Location of the configuration file on `platform`.
pub fn config_path(platform: Platform) -> PathBuf {
    match platform {
        Platform::Windows => PathBuf::from(
            r"C:\Users\LifeScale\Documents\peak_caller_config\peak_caller_config.json",
        ),
        Platform::Unix => PathBuf::from("./dev_config.json"),
    }
}

/// Load the configuration stored at `path`.
///
/// When the file does not exist yet, the defaults are written there and
/// returned along with `Some(path)` so the caller can tell the user once.
pub fn load_or_init(path: &Path) -> Result<(Configuration, Option<PathBuf>)> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let config: Configuration = serde_json::from_str(&text)?;
            Ok((config, None))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let config = Configuration::default();
            save(path, &config)?;
            info!("Wrote default configuration to {}", path.display());
            Ok((config, Some(path.to_path_buf())))
        }
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Persist `config` at `path`, creating parent folders as needed.
pub fn save(path: &Path, config: &Configuration) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let text = serde_json::to_string_pretty(config)?;
    std::fs::write(path, text).map_err(|e| Error::io(path, e))
}
