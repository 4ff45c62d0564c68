//! Raw frame transmit capability.
//!
//! The scheduler only ever sees this trait. The device binds it to
//! `esp_wifi_80211_tx`, the host binary to [`LogRadio`].

use crate::frame::MacAddress;

pub trait Radio {
    /// Retunes the radio. Called only with channels in 1..=14.
    fn set_channel(&mut self, channel: u8) -> anyhow::Result<()>;

    /// Hands one frame to the radio. `true` means it was accepted.
    fn transmit(&mut self, frame: &[u8]) -> bool;

    fn hardware_mac(&self) -> MacAddress;
}

/// Host stand-in that logs instead of transmitting.
#[derive(Debug, Default)]
pub struct LogRadio {
    channel: u8,
    sent: u64,
}

impl LogRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Radio for LogRadio {
    fn set_channel(&mut self, channel: u8) -> anyhow::Result<()> {
        log::debug!("radio channel -> {}", channel);
        self.channel = channel;
        Ok(())
    }

    fn transmit(&mut self, frame: &[u8]) -> bool {
        self.sent += 1;
        log::trace!("tx ch{} {} bytes", self.channel, frame.len());
        true
    }

    fn hardware_mac(&self) -> MacAddress {
        MacAddress([0x02, 0x00, 0x00, 0xbe, 0xac, 0x00])
    }
}

/// Keeps a copy of every frame. Used to check scheduler output.
#[derive(Debug, Default)]
pub struct RecordingRadio {
    pub channel: u8,
    pub channel_changes: Vec<u8>,
    pub frames: Vec<(u8, Vec<u8>)>,
    /// Every n-th transmit reports failure when set.
    pub fail_every: Option<usize>,
    attempts: usize,
}

impl RecordingRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// SSIDs of the recorded frames, in send order.
    pub fn ssids(&self) -> Vec<String> {
        use crate::frame::{SSID_LEN_OFFSET, SSID_OFFSET};

        self.frames
            .iter()
            .map(|(_, f)| {
                let len = f[SSID_LEN_OFFSET] as usize;
                String::from_utf8_lossy(&f[SSID_OFFSET..SSID_OFFSET + len])
                    .trim_end()
                    .to_string()
            })
            .collect()
    }
}

impl Radio for RecordingRadio {
    fn set_channel(&mut self, channel: u8) -> anyhow::Result<()> {
        self.channel = channel;
        self.channel_changes.push(channel);
        Ok(())
    }

    fn transmit(&mut self, frame: &[u8]) -> bool {
        self.attempts += 1;
        if let Some(n) = self.fail_every {
            if n > 0 && self.attempts % n == 0 {
                return false;
            }
        }
        self.frames.push((self.channel, frame.to_vec()));
        true
    }

    fn hardware_mac(&self) -> MacAddress {
        MacAddress([0x24, 0x6f, 0x28, 0x00, 0x00, 0x01])
    }
}
