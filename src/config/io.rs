use std::env::current_exe;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str;
use directories_next::ProjectDirs;
use fd_lock::{RwLock, RwLockWriteGuard};
use log::{info, warn};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::config::types::Config;
use crate::error::ConfigError;

const CONFIG_FILE_NAME: &str = "tappie-control.json";

// C:\tools\tappie-control.exe => C:\tools\tappie-control.json, so the tool can live on a usb stick
fn portable_config_path() -> Option<PathBuf> {
    let mut path = match current_exe() {
        Ok(path) => path,
        Err(err) => {
            warn!("Failed to get current exe path: {:?}", err);
            return None;
        },
    };

    if !path.set_extension("json") {
        warn!("Current exe has no file name: {}", path.to_string_lossy());
        return None;
    }

    match std::fs::metadata(&path) {
        Ok(attr) if attr.is_file() => Some(path),
        _ => None,
    }
}

// %AppData%\tappie\tappie-control\config\tappie-control.json on windows, ~/.config/tappie-control/ on linux
fn local_config_path() -> Option<PathBuf> {
    ProjectDirs::from("io", "tappie", "tappie-control")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    portable_config_path()
        .or_else(local_config_path)
        .ok_or(ConfigError::NoConfigPath)
}

/// Exclusive lock on the config file, held for as long as the process talks to the peripheral.
pub struct ConfigLock {
    rw_lock: RwLock<std::fs::File>,
}

impl ConfigLock {
    pub fn acquire(&mut self) -> Result<RwLockWriteGuard<'_, std::fs::File>, ConfigError> {
        self.rw_lock.try_write().map_err(|source| ConfigError::CanNotLock { source })
    }
}

pub struct ConfigIO {
    path: PathBuf,
    file: std::fs::File,
}

impl ConfigIO {
    pub fn open(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = resolve_config_path(explicit)?;
        info!("Using config file {}", path.to_string_lossy());

        if let Some(directory) = path.parent() {
            if !directory.as_os_str().is_empty() {
                std::fs::create_dir_all(directory)?;
            }
        }

        // created empty if missing, so that the lock has something to hold on to
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .truncate(false)
            .create(true)
            .open(&path)?;

        Ok(ConfigIO { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock(&self) -> Result<ConfigLock, ConfigError> {
        Ok(ConfigLock {
            rw_lock: RwLock::new(self.file.try_clone()?),
        })
    }

    pub async fn read(&self) -> Result<Config, ConfigError> {
        let mut file = File::from_std(self.file.try_clone()?);
        file.rewind().await?;

        let mut content = vec![];
        file.read_to_end(&mut content).await?;
        parse_config(&content)
    }
}

fn parse_config(content: &[u8]) -> Result<Config, ConfigError> {
    let content = str::from_utf8(content)?;
    if content.trim().is_empty() {
        info!("Config file is empty, using defaults");
        return Ok(Config::default());
    }

    let config: Config = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Reads the config without creating or locking anything. A missing file reads as the defaults.
pub async fn read_config_if_present(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = resolve_config_path(explicit)?;

    match tokio::fs::read(&path).await {
        Ok(content) => parse_config(&content),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!("No config file at {}, using defaults", path.to_string_lossy());
            Ok(Config::default())
        },
        Err(err) => Err(err.into()),
    }
}
