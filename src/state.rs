use std::sync::{Arc, Mutex, MutexGuard};

use crate::{config::Config, identity::NetworkIdentity, storage::Storage};

/// What the beacon loop and the portal share.
pub struct AppState<S> {
    pub config: Config,
    pub identities: Vec<NetworkIdentity>,
    pub storage: Storage<S>,
    pub packets_per_second: u32,
}

impl<S: crate::storage::KvStore> AppState<S> {
    /// Loads config and identities from `storage`, falling back to defaults.
    pub fn load(mut storage: Storage<S>) -> Self {
        let config = storage.load_config();
        let identities = storage.load_identities();
        log::info!("Loaded {} identities", identities.len());
        for id in &identities {
            log::debug!("  {}", id.name);
        }
        Self {
            config,
            identities,
            storage,
            packets_per_second: 0,
        }
    }
}

pub type SharedState<S> = Arc<Mutex<AppState<S>>>;

pub fn shared<S>(state: AppState<S>) -> SharedState<S> {
    Arc::new(Mutex::new(state))
}

/// Locks the state, recovering from a poisoned lock. A panicked handler must
/// not stop the beacons.
pub fn lock<S>(state: &SharedState<S>) -> MutexGuard<'_, AppState<S>> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}
