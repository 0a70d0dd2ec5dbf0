use std::collections::HashMap;
use std::sync::Mutex;
use log::debug;

use crate::error::MixerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteChange {
    Mute,
    Unmute,
    Toggle,
}

/// Host audio mixer, addressed by numeric device index.
///
/// Calls are expected to be fast; they run on the controller task.
pub trait Mixer: Send + Sync {
    /// Volume in percent, `0..=100`.
    fn volume(&self, device: u32) -> Result<u8, MixerError>;

    fn set_volume(&self, device: u32, volume: u8) -> Result<(), MixerError>;

    fn is_muted(&self, device: u32) -> Result<bool, MixerError>;

    /// Returns the mute flag after the change.
    fn set_mute(&self, device: u32, change: MuteChange) -> Result<bool, MixerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Channel {
    volume: u8,
    muted: bool,
}

/// In-process mixer that only knows the device indices it was created with.
pub struct SimulatedMixer {
    channels: Mutex<HashMap<u32, Channel>>,
}

impl SimulatedMixer {
    pub const INITIAL_VOLUME: u8 = 50;

    pub fn new(devices: impl IntoIterator<Item = u32>) -> Self {
        let channels = devices
            .into_iter()
            .map(|device| (device, Channel { volume: Self::INITIAL_VOLUME, muted: false }))
            .collect();

        SimulatedMixer { channels: Mutex::new(channels) }
    }

    fn with_channel<R>(&self, device: u32, f: impl FnOnce(&mut Channel) -> R) -> Result<R, MixerError> {
        let mut channels = self.channels
            .lock()
            .map_err(|_| MixerError::Backend("mixer state is poisoned".to_string()))?;

        channels.get_mut(&device).map(f).ok_or(MixerError::UnknownDevice(device))
    }
}

impl Mixer for SimulatedMixer {
    fn volume(&self, device: u32) -> Result<u8, MixerError> {
        self.with_channel(device, |channel| channel.volume)
    }

    fn set_volume(&self, device: u32, volume: u8) -> Result<(), MixerError> {
        self.with_channel(device, |channel| channel.volume = volume.min(100))?;
        debug!("Mixer device {} volume set to {}", device, volume);
        Ok(())
    }

    fn is_muted(&self, device: u32) -> Result<bool, MixerError> {
        self.with_channel(device, |channel| channel.muted)
    }

    fn set_mute(&self, device: u32, change: MuteChange) -> Result<bool, MixerError> {
        let muted = self.with_channel(device, |channel| {
            channel.muted = match change {
                MuteChange::Mute => true,
                MuteChange::Unmute => false,
                MuteChange::Toggle => !channel.muted,
            };
            channel.muted
        })?;
        debug!("Mixer device {} muted: {}", device, muted);
        Ok(muted)
    }
}
