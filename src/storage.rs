//! Persistence of the config, the identity list and the custom portal page.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::{
    config::{Config, ConfigError},
    identity::{self, NetworkIdentity},
};

pub const CONFIG_KEY: &str = "config";
pub const SSIDS_KEY: &str = "ssids";
pub const PORTAL_HTML_KEY: &str = "portal_html";

/// Byte oriented key/value backend. Keys are short ASCII names.
pub trait KvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn set(&mut self, key: &str, value: &[u8]) -> anyhow::Result<()>;
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;

    fn contains(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        match std::fs::read(self.path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        std::fs::write(self.path(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        match std::fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

pub struct Storage<S> {
    store: S,
}

impl<S: KvStore> Storage<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stored config, or the defaults (written back) when it is missing,
    /// unreadable or from another firmware version.
    pub fn load_config(&mut self) -> Config {
        let stored = match self.store.get(CONFIG_KEY) {
            Ok(stored) => stored,
            Err(e) => {
                log::error!("Failed to read config: {:?}", e);
                None
            }
        };

        match stored.as_deref().map(Config::decode) {
            Some(Ok(config)) => return config,
            Some(Err(ConfigError::Version { found })) => {
                log::warn!("Config version {:#010x} is stale, using defaults", found)
            }
            Some(Err(e)) => log::warn!("Config is corrupt ({}), using defaults", e),
            None => log::info!("No config stored, using defaults"),
        }

        let config = Config::default();
        if let Err(e) = self.save_config(&config) {
            log::error!("Failed to save default config: {:?}", e);
        }
        config
    }

    pub fn save_config(&mut self, config: &Config) -> anyhow::Result<()> {
        self.store.set(CONFIG_KEY, &config.encode())
    }

    /// Raw identity list text as last saved.
    pub fn load_identity_text(&mut self) -> String {
        match self.store.get(SSIDS_KEY) {
            Ok(Some(raw)) => String::from_utf8_lossy(&raw).into_owned(),
            Ok(None) => {
                log::info!("No identity list stored, writing defaults");
                if let Err(e) = self.store.set(SSIDS_KEY, identity::DEFAULT_IDENTITIES.as_bytes()) {
                    log::error!("Failed to save default identities: {:?}", e);
                }
                identity::DEFAULT_IDENTITIES.to_string()
            }
            Err(e) => {
                log::error!("Failed to read identities: {:?}", e);
                identity::DEFAULT_IDENTITIES.to_string()
            }
        }
    }

    pub fn load_identities(&mut self) -> Vec<NetworkIdentity> {
        identity::parse_list(&self.load_identity_text())
    }

    /// Stores `raw` verbatim and returns the list as it will be loaded.
    pub fn save_identities(&mut self, raw: &str) -> anyhow::Result<Vec<NetworkIdentity>> {
        self.store.set(SSIDS_KEY, raw.as_bytes())?;
        Ok(self.load_identities())
    }

    pub fn has_custom_portal(&self) -> bool {
        self.store.contains(PORTAL_HTML_KEY).unwrap_or(false)
    }

    pub fn load_custom_portal(&self) -> anyhow::Result<Option<String>> {
        Ok(self
            .store
            .get(PORTAL_HTML_KEY)?
            .map(|raw| String::from_utf8_lossy(&raw).into_owned()))
    }

    pub fn save_custom_portal(&mut self, html: &str) -> anyhow::Result<()> {
        self.store.set(PORTAL_HTML_KEY, html.as_bytes())
    }

    pub fn delete_custom_portal(&mut self) -> anyhow::Result<()> {
        self.store.remove(PORTAL_HTML_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_falls_back_and_is_persisted() {
        let mut storage = Storage::new(MemoryStore::new());
        assert_eq!(storage.load_config(), Config::default());
        assert!(storage.store().contains(CONFIG_KEY).unwrap());
    }

    #[test]
    fn stale_config_is_reset() {
        let mut store = MemoryStore::new();
        let mut old = Config::default();
        old.version = 1;
        old.wpa2 = true;
        store.set(CONFIG_KEY, &old.encode()).unwrap();

        let mut storage = Storage::new(store);
        let config = storage.load_config();
        assert!(!config.wpa2);

        let stored = storage.store().get(CONFIG_KEY).unwrap().unwrap();
        assert_eq!(Config::decode(&stored).unwrap(), Config::default());
    }

    #[test]
    fn config_survives_save_and_load() {
        let mut storage = Storage::new(MemoryStore::new());
        let mut config = Config::default();
        config.beacon_interval = 250;
        config.ap_name = "Lobby".to_string();
        storage.save_config(&config).unwrap();
        assert_eq!(storage.load_config(), config);
    }

    #[test]
    fn identities_default_then_saved_verbatim() {
        let mut storage = Storage::new(MemoryStore::new());
        assert_eq!(storage.load_identities().len(), 50);

        let raw = concat!(
            "  Free Wifi \n",
            "This entry is much too long for an SSID field\n",
            "Totally Legit|http://x",
        );
        let list = storage.save_identities(raw).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].url.as_deref(), Some("http://x"));
        assert_eq!(storage.load_identity_text(), raw);
    }

    #[test]
    fn custom_portal_lifecycle() {
        let mut storage = Storage::new(MemoryStore::new());
        assert!(!storage.has_custom_portal());
        storage.save_custom_portal("<h1>hi</h1>").unwrap();
        assert!(storage.has_custom_portal());
        assert_eq!(storage.load_custom_portal().unwrap().as_deref(), Some("<h1>hi</h1>"));
        storage.delete_custom_portal().unwrap();
        assert!(!storage.has_custom_portal());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut storage = Storage::new(FileStore::open(dir.path()).unwrap());
            let mut config = Config::default();
            config.wpa2 = true;
            storage.save_config(&config).unwrap();
            storage.save_identities("one\ntwo").unwrap();
        }

        let mut storage = Storage::new(FileStore::open(dir.path()).unwrap());
        assert!(storage.load_config().wpa2);
        assert_eq!(storage.load_identities().len(), 2);

        let mut store = FileStore::open(dir.path()).unwrap();
        store.remove("missing").unwrap();
        assert_eq!(store.get("missing").unwrap(), None);
    }
}
