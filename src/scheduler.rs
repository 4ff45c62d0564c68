//! Beacon tick scheduling.
//!
//! Every `beacon_interval` the scheduler hops channel once and sends a fixed
//! batch of identities, continuing the rotation where the previous tick
//! stopped. Each frame goes out as a short burst. Once a second the number of
//! accepted frames is logged and reset.

use std::fmt::Debug;
use std::time::Duration;

use crate::{
    channel::ChannelHopper,
    clock::elapsed,
    config::Config,
    frame::{FrameBuffer, FrameBuilder, MacAddress, SecurityMode, SsidLayout, MAX_FRAME_LEN},
    identity::NetworkIdentity,
    radio::Radio,
};

pub const RATE_REPORT_PERIOD_MS: u32 = 1000;
pub const MAX_BURST: u8 = 3;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub interval_ms: u32,
    pub batch_size: usize,
    pub burst_count: u8,
    pub burst_spacing: Duration,
    pub channels: Vec<u8>,
    pub mode: SecurityMode,
    pub layout: SsidLayout,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval_ms: config.beacon_interval,
            batch_size: config.batch_size.max(1) as usize,
            burst_count: config.burst_count.clamp(1, MAX_BURST),
            burst_spacing: Duration::from_millis(1),
            channels: config.channels.clone(),
            mode: SecurityMode::from_wpa2(config.wpa2),
            layout: SsidLayout::from_append_spaces(config.append_spaces),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Where the rotation stands. Only the scheduler touches it.
#[derive(Debug, Clone)]
pub struct TransmitCursor {
    pub mac: MacAddress,
    /// Next identity to send, always below the list length after a tick.
    pub index: usize,
    pub channel: u8,
    /// Accepted transmissions since the last rate report.
    pub packet_counter: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Hopping,
    Sending,
    RateReporting,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub channel: u8,
    pub frames: usize,
    pub accepted: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub tick: Option<TickReport>,
    /// Packets per second, set once per report period.
    pub rate: Option<u32>,
}

pub struct BeaconScheduler {
    settings: SchedulerSettings,
    builder: FrameBuilder,
    hopper: ChannelHopper,
    cursor: TransmitCursor,
    scratch: FrameBuffer,
    phase: Phase,
    last_tick: Option<u32>,
    last_rate: u32,
    last_rate_value: u32,
    total_failed: u64,
}

impl Debug for BeaconScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BeaconScheduler(phase={:?}, index={}, channel={}, mac={})",
            self.phase, self.cursor.index, self.cursor.channel, self.cursor.mac
        )
    }
}

impl BeaconScheduler {
    pub fn new(settings: SchedulerSettings, mac: MacAddress) -> Self {
        let hopper = ChannelHopper::new(&settings.channels);
        let builder = FrameBuilder::new(settings.mode, settings.layout);
        Self {
            cursor: TransmitCursor {
                mac,
                index: 0,
                channel: hopper.current(),
                packet_counter: 0,
            },
            settings,
            builder,
            hopper,
            scratch: [0; MAX_FRAME_LEN],
            phase: Phase::Idle,
            last_tick: None,
            last_rate: 0,
            last_rate_value: 0,
            total_failed: 0,
        }
    }

    /// Tunes the radio to the first channel. Call once before polling.
    pub fn start<R: Radio>(&mut self, radio: &mut R, now: u32) -> anyhow::Result<()> {
        radio.set_channel(self.cursor.channel)?;
        self.last_rate = now;
        log::info!(
            "Beacon scheduler started: {:?} {:?}, interval {}ms, batch {}, burst {}, mac {}",
            self.settings.mode,
            self.settings.layout,
            self.settings.interval_ms,
            self.settings.batch_size,
            self.settings.burst_count,
            self.cursor.mac
        );
        Ok(())
    }

    pub fn cursor(&self) -> &TransmitCursor {
        &self.cursor
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Last reported packets per second.
    pub fn packets_per_second(&self) -> u32 {
        self.last_rate_value
    }

    pub fn total_failed(&self) -> u64 {
        self.total_failed
    }

    /// Runs a tick if the interval has passed and reports the packet rate
    /// once per period. Never blocks longer than one batch.
    pub fn poll<R: Radio>(
        &mut self,
        now: u32,
        identities: &[NetworkIdentity],
        radio: &mut R,
    ) -> PollOutcome {
        let mut outcome = PollOutcome::default();

        let due = match self.last_tick {
            None => true,
            Some(last) => elapsed(now, last) >= self.settings.interval_ms,
        };
        if due {
            self.last_tick = Some(now);
            outcome.tick = self.tick(identities, radio);
        }

        if elapsed(now, self.last_rate) >= RATE_REPORT_PERIOD_MS {
            self.phase = Phase::RateReporting;
            self.last_rate = now;
            self.last_rate_value = self.cursor.packet_counter;
            log::info!("Packets/s: {}", self.cursor.packet_counter);
            self.cursor.packet_counter = 0;
            outcome.rate = Some(self.last_rate_value);
        }

        self.phase = Phase::Idle;
        outcome
    }

    /// One beacon tick regardless of timing. `None` when there is nothing to send.
    pub fn tick<R: Radio>(
        &mut self,
        identities: &[NetworkIdentity],
        radio: &mut R,
    ) -> Option<TickReport> {
        if identities.is_empty() {
            return None;
        }

        self.phase = Phase::Hopping;
        let hop = self.hopper.next();
        if hop.changed {
            match radio.set_channel(hop.channel) {
                Ok(()) => self.cursor.channel = hop.channel,
                Err(e) => log::warn!("Failed to set channel {}: {:?}", hop.channel, e),
            }
        }

        self.phase = Phase::Sending;
        if self.cursor.index >= identities.len() {
            self.cursor.index = 0;
        }

        let mut report = TickReport {
            channel: self.cursor.channel,
            ..Default::default()
        };

        for _ in 0..self.settings.batch_size {
            let position = self.cursor.index;
            self.cursor.index = (position + 1) % identities.len();

            // keyed on the rotation slot, not on the name
            let mac = self.cursor.mac.with_suffix((position + 1) as u8);
            let len = self
                .builder
                .build(&mut self.scratch, identities[position].ssid(), mac, self.cursor.channel);
            report.frames += 1;

            for attempt in 0..self.settings.burst_count {
                if attempt > 0 && !self.settings.burst_spacing.is_zero() {
                    std::thread::sleep(self.settings.burst_spacing);
                }
                if radio.transmit(&self.scratch[..len]) {
                    self.cursor.packet_counter = self.cursor.packet_counter.wrapping_add(1);
                    report.accepted += 1;
                } else {
                    report.failed += 1;
                }
            }
        }

        self.total_failed += report.failed as u64;
        Some(report)
    }
}
