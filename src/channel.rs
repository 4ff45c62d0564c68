//! Channel hopping over the configured 2.4GHz channel list.

pub const DEFAULT_CHANNELS: [u8; 3] = [1, 6, 11];

pub fn is_valid_channel(channel: u8) -> bool {
    (1..=14).contains(&channel)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    pub channel: u8,
    /// The radio has to be retuned before the next frame goes out.
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct ChannelHopper {
    channels: Vec<u8>,
    index: usize,
    current: u8,
}

impl ChannelHopper {
    pub fn new(channels: &[u8]) -> Self {
        let channels = if channels.is_empty() {
            DEFAULT_CHANNELS.to_vec()
        } else {
            channels.to_vec()
        };
        let current = channels
            .iter()
            .copied()
            .find(|c| is_valid_channel(*c))
            .unwrap_or(DEFAULT_CHANNELS[0]);

        Self {
            channels,
            index: 0,
            current,
        }
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    /// Moves to the next configured channel.
    ///
    /// Out of range entries are stepped over without touching the radio, so
    /// the current channel stays on the last valid one.
    pub fn next(&mut self) -> Hop {
        if self.channels.len() <= 1 {
            return Hop {
                channel: self.current,
                changed: false,
            };
        }

        let candidate = self.channels[self.index];
        self.index = (self.index + 1) % self.channels.len();

        if candidate == self.current || !is_valid_channel(candidate) {
            if !is_valid_channel(candidate) {
                log::debug!("Skipping invalid channel {}", candidate);
            }
            return Hop {
                channel: self.current,
                changed: false,
            };
        }

        self.current = candidate;
        Hop {
            channel: candidate,
            changed: true,
        }
    }
}

impl Default for ChannelHopper {
    fn default() -> Self {
        Self::new(&DEFAULT_CHANNELS)
    }
}
