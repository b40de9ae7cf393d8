use crate::settings::{SettingsError, SettingsStore};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const APP_DIR: &str = "tabletalk";
const SETTINGS_FILE: &str = "settings.json";

pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(SETTINGS_FILE)
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
    dirty: bool,
}

impl FileStore {
    pub fn open(path: PathBuf) -> (Self, Option<String>) {
        let (values, warning) = match read_values(&path) {
            Ok(values) => (values, None),
            Err(err) => {
                warn!(error = %err, "starting with empty settings");
                (BTreeMap::new(), Some(err.to_string()))
            }
        };
        (
            Self {
                path,
                values,
                dirty: false,
            },
            warning,
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

fn read_values(path: &Path) -> Result<BTreeMap<String, String>, SettingsError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };
    serde_json::from_slice(&data).map_err(|source| SettingsError::Json {
        path: path.display().to_string(),
        source,
    })
}

fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, bytes)?;
    match fs::rename(&tmp_path, path) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if path.exists() {
                fs::remove_file(path)?;
                fs::rename(&tmp_path, path)
            } else {
                Err(rename_err)
            }
        }
    }
}

impl SettingsStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Option<String>) {
        let changed = match value {
            Some(value) => self.values.insert(key.to_string(), value.clone()) != Some(value),
            None => self.values.remove(key).is_some(),
        };
        self.dirty |= changed;
    }

    fn flush(&mut self) -> Result<(), SettingsError> {
        if !self.dirty {
            return Ok(());
        }
        let io_error = |source: io::Error| SettingsError::Io {
            path: self.path.display().to_string(),
            source,
        };
        let bytes = serde_json::to_vec_pretty(&self.values).map_err(|source| {
            SettingsError::Json {
                path: self.path.display().to_string(),
                source,
            }
        })?;
        write_atomically(&self.path, &bytes).map_err(io_error)?;
        self.dirty = false;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.values.insert(key.to_string(), value);
            }
            None => {
                self.values.remove(key);
            }
        }
    }
}
