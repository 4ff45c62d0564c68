//! Beacon broadcaster with a captive portal.
//!
//! Everything except [`platform`] builds and tests on the host.

pub mod channel;
pub mod clock;
pub mod config;
pub mod dns;
pub mod frame;
pub mod identity;
pub mod platform;
pub mod portal;
pub mod radio;
pub mod scheduler;
pub mod security;
pub mod service;
pub mod state;
pub mod storage;
