use std::net::Ipv4Addr;

use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::prelude::Peripherals,
    nvs::{EspDefaultNvs, EspDefaultNvsPartition},
    sys::{self, esp},
};

use super::beacon_mac;
use crate::{
    clock::Clock,
    dns,
    frame::MacAddress,
    portal::{CaptivePortal, ClientInfo, DeviceInfo, PortalService},
    radio::Radio,
    scheduler::{BeaconScheduler, SchedulerSettings},
    security::SecurityGate,
    service,
    state::{self, AppState},
    storage::{KvStore, Storage},
};

const NVS_NAMESPACE: &str = "beaconkit";

pub fn run() -> anyhow::Result<()> {
    sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    // tokio needs eventfd for its reactor
    let _fs = esp_idf_svc::io::vfs::MountedEventfs::mount(5)?;
    let partition = EspDefaultNvsPartition::take()?;
    let nvs = EspDefaultNvs::new(partition, NVS_NAMESPACE, true)?;

    let clock = Clock::new();
    let state = state::shared(AppState::load(Storage::new(NvsStore(nvs))));
    let config = state::lock(&state).config.clone();
    log_heap();

    let portal = PortalService::new(state.clone(), SecurityGate::default(), EspDevice { clock });
    let _portal = CaptivePortal::start(peripherals.modem, sysloop, &config, portal, clock)?;
    log_heap();

    // raw tx goes out of the SoftAP interface, so the AP must be up first
    let radio = EspRadio;
    let mac = beacon_mac(&config, radio.hardware_mac());
    let scheduler = BeaconScheduler::new(SchedulerSettings::from_config(&config), mac);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let r = rt.block_on(async {
        let dns_socket =
            tokio::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, dns::DNS_PORT)).await?;
        log::info!("DNS responder on port {}", dns::DNS_PORT);
        let shutdown = std::future::pending();
        service::run(state, scheduler, radio, clock, Some(dns_socket), shutdown).await
    });
    if let Err(e) = r {
        log::error!("Service error: {:?}", e);
    }

    log::error!("Service loop finished, restarting");
    unsafe { sys::esp_restart() }
}

pub fn log_heap() {
    unsafe {
        use sys::{heap_caps_get_free_size, MALLOC_CAP_INTERNAL};

        log::info!(
            "Free INTERNAL heap size: {}KB",
            heap_caps_get_free_size(MALLOC_CAP_INTERNAL) / 1024
        );
    }
}

/// NVS namespace with one blob per key.
struct NvsStore(EspDefaultNvs);

impl KvStore for NvsStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let Some(len) = self.0.blob_len(key)? else {
            return Ok(None);
        };
        let mut buf = vec![0; len];
        Ok(self.0.get_blob(key, &mut buf)?.map(<[u8]>::to_vec))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.0.set_blob(key, value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.0.remove(key)?;
        Ok(())
    }

    fn contains(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.0.contains(key)?)
    }
}

/// Transmits through the SoftAP interface with `esp_wifi_80211_tx`.
struct EspRadio;

impl Radio for EspRadio {
    fn set_channel(&mut self, channel: u8) -> anyhow::Result<()> {
        esp!(unsafe {
            sys::esp_wifi_set_channel(channel, sys::wifi_second_chan_t_WIFI_SECOND_CHAN_NONE)
        })?;
        Ok(())
    }

    fn transmit(&mut self, frame: &[u8]) -> bool {
        esp!(unsafe {
            sys::esp_wifi_80211_tx(
                sys::wifi_interface_t_WIFI_IF_AP,
                frame.as_ptr() as *const core::ffi::c_void,
                frame.len() as i32,
                // radio fills in the sequence number
                true,
            )
        })
        .is_ok()
    }

    fn hardware_mac(&self) -> MacAddress {
        let mut mac = [0u8; 6];
        unsafe {
            sys::esp_read_mac(mac.as_mut_ptr(), sys::esp_mac_type_t_ESP_MAC_WIFI_SOFTAP);
        }
        MacAddress(mac)
    }
}

struct EspDevice {
    clock: Clock,
}

impl DeviceInfo for EspDevice {
    fn uptime_secs(&self) -> u64 {
        self.clock.uptime_secs()
    }

    fn free_heap(&self) -> usize {
        unsafe { sys::esp_get_free_heap_size() as usize }
    }

    fn clients(&self) -> Vec<ClientInfo> {
        let mut list = sys::wifi_sta_list_t::default();
        if let Err(e) = esp!(unsafe { sys::esp_wifi_ap_get_sta_list(&mut list) }) {
            log::warn!("Failed to list stations: {:?}", e);
            return Vec::new();
        }
        list.sta[..list.num.max(0) as usize]
            .iter()
            .map(|sta| ClientInfo {
                mac: MacAddress(sta.mac).to_string(),
                rssi: sta.rssi,
            })
            .collect()
    }
}
