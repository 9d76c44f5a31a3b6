use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::contacts::ContactStore;
use crate::sink::SinkKind;
use crate::storage::{KeyValueStore, MemoryStore, SqliteStore, default_db_path};

/// Operator settings. Contacts and preferences live in the store instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    pub check_interval_secs: u64,
    pub auto_send_delay_ms: u64,
    pub manual_send_delay_ms: u64,
    pub sink: SinkKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            check_interval_secs: 60,
            auto_send_delay_ms: 1000,
            manual_send_delay_ms: 500,
            sink: SinkKind::Browser,
        }
    }
}

impl Settings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn auto_send_delay(&self) -> Duration {
        Duration::from_millis(self.auto_send_delay_ms)
    }

    pub fn manual_send_delay(&self) -> Duration {
        Duration::from_millis(self.manual_send_delay_ms)
    }

    // TOML is the settings format; a JSON file left by older versions is
    // converted to TOML the first time it is found.
    pub fn default_path() -> Option<PathBuf> {
        let proj = ProjectDirs::from("com", "example", "BirthdayNotifier")?;
        Some(proj.config_dir().join("settings.toml"))
    }

    fn legacy_json_path(toml_path: &Path) -> PathBuf {
        toml_path.with_extension("json")
    }

    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Self::default();
        };

        if let Ok(text) = fs::read_to_string(&path) {
            match toml::from_str::<Settings>(&text) {
                Ok(settings) => return settings,
                Err(e) => warn!("ignoring unreadable settings {}: {e}", path.display()),
            }
        }

        let legacy = Self::legacy_json_path(&path);
        if let Ok(bytes) = fs::read(&legacy) {
            if let Ok(settings) = serde_json::from_slice::<Settings>(&bytes) {
                match settings.save(&path) {
                    Ok(()) => info!("migrated {} to {}", legacy.display(), path.display()),
                    Err(e) => warn!("could not migrate legacy settings: {e}"),
                }
                return settings;
            }
        }

        Self::default()
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, toml)
    }
}

/// Everything a command needs: settings plus the shared stores.
pub struct App {
    pub settings: Settings,
    pub backend: Arc<dyn KeyValueStore>,
    pub contacts: Arc<Mutex<ContactStore>>,
}

impl App {
    pub fn open(settings: Settings) -> Self {
        let backend = open_backend(&settings);
        let contacts = Arc::new(Mutex::new(ContactStore::load(backend.clone())));
        Self {
            settings,
            backend,
            contacts,
        }
    }

    pub fn contacts(&self) -> anyhow::Result<std::sync::MutexGuard<'_, ContactStore>> {
        self.contacts
            .lock()
            .map_err(|_| anyhow::anyhow!("contact store lock poisoned"))
    }
}

fn open_backend(settings: &Settings) -> Arc<dyn KeyValueStore> {
    let path = settings.database_path.clone().or_else(default_db_path);
    match path.map(|p| SqliteStore::open(&p).map(|s| (p, s))) {
        Some(Ok((path, store))) => {
            info!("using store at {}", path.display());
            Arc::new(store)
        }
        Some(Err(e)) => {
            log::error!("cannot open store, changes will not be kept: {e}");
            Arc::new(MemoryStore::new())
        }
        None => {
            log::error!("no data directory, changes will not be kept");
            Arc::new(MemoryStore::new())
        }
    }
}
