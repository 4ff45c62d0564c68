use std::net::Ipv4Addr;

use super::beacon_mac;
use crate::{
    clock::Clock,
    radio::{LogRadio, Radio},
    scheduler::{BeaconScheduler, SchedulerSettings},
    service,
    state::{self, AppState},
    storage::{FileStore, Storage},
};

const DATA_DIR_ENV: &str = "BEACONKIT_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "./data";
const DNS_PORT_ENV: &str = "BEACONKIT_DNS_PORT";
/// Port 53 needs privileges on most hosts.
const DEFAULT_DNS_PORT: u16 = 5353;

pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let dir = std::env::var(DATA_DIR_ENV).unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
    log::info!("Data directory: {}", dir);
    let store = FileStore::open(&dir)?;

    let clock = Clock::new();
    let state = state::shared(AppState::load(Storage::new(store)));
    let config = state::lock(&state).config.clone();

    let radio = LogRadio::new();
    let mac = beacon_mac(&config, radio.hardware_mac());
    let scheduler = BeaconScheduler::new(SchedulerSettings::from_config(&config), mac);

    let dns_port = match std::env::var(DNS_PORT_ENV) {
        Ok(v) => v.parse()?,
        Err(_) => DEFAULT_DNS_PORT,
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let radio = rt.block_on(async {
        let dns_socket = match tokio::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, dns_port)).await {
            Ok(s) => {
                log::info!("DNS responder on 127.0.0.1:{}", dns_port);
                Some(s)
            }
            Err(e) => {
                log::warn!("DNS responder disabled, bind {} failed: {:?}", dns_port, e);
                None
            }
        };
        service::run(state, scheduler, radio, clock, dns_socket, std::future::pending()).await
    })?;

    log::info!("{} frames handed to the radio", radio.sent());
    Ok(())
}
