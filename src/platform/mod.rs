//! Target bindings. The device build runs on ESP-IDF, every other target
//! gets a host build that beacons into the log.

use crate::{config::Config, frame::MacAddress};

#[cfg(target_os = "espidf")]
mod esp;
#[cfg(not(target_os = "espidf"))]
mod host;

pub fn run() -> anyhow::Result<()> {
    #[cfg(target_os = "espidf")]
    return esp::run();

    #[cfg(not(target_os = "espidf"))]
    return host::run();
}

/// Source address for the beacons: a random locally administered unicast
/// address, or the radio's own.
pub fn beacon_mac(config: &Config, hardware: MacAddress) -> MacAddress {
    if config.randomize_mac {
        MacAddress::local_unicast(rand::random())
    } else {
        hardware
    }
}
