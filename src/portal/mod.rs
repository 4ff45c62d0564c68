//! Captive portal: public landing page plus the password protected admin API.
//!
//! Route handling is platform independent. On the device `server` binds it
//! to the SoftAP and ESP-IDF's HTTP server.

use std::net::Ipv4Addr;

mod handlers;
pub mod html;
#[cfg(target_os = "espidf")]
mod server;

pub use handlers::{
    parse_basic_auth, Action, ClientInfo, DeviceInfo, PortalRequest, PortalResponse, PortalService,
    MAX_PORTAL_HTML_LEN, MAX_SSID_LIST_LEN,
};
#[cfg(target_os = "espidf")]
pub use server::CaptivePortal;

/// Fixed address of the portal on its own SoftAP.
pub const PORTAL_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
pub const PORTAL_IP_STR: &str = "192.168.4.1";
pub const PORTAL_URL: &str = "http://192.168.4.1/";

#[cfg(test)]
mod tests;
