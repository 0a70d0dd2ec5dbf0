use std::path::Path;
use std::sync::Arc;
use futures::channel::mpsc::{channel, Sender};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::audio::mixer::{Mixer, MuteChange};
use crate::config::types::{BatteryAlertPolicy, Config, TargetConfig};
use crate::controller::timer::IdleResetTimer;
use crate::controller::types::{ControllerCommand, ControllerState, LinkStatus};
use crate::controller::volume::{at_boundary, direction, next_volume, Direction};
use crate::device::types::{DomainEvent, Gesture};
use crate::error::ConfigError;
use crate::sim::automation::Automation;
use crate::sim::types::MediaKey;

const SELECTED_MARKER: &str = "→ ";

/// Translates device events into mixer and automation calls.
///
/// Not thread safe on purpose: a single task owns it and feeds it one [`ControllerCommand`] at a
/// time, idle timer firings included.
pub struct DeviceController {
    config: Config,
    default_target: String,
    mixer: Arc<dyn Mixer>,
    automation: Arc<dyn Automation>,
    // the queue this controller is consumed from, used to deliver idle timer firings
    commands: Sender<ControllerCommand>,
    state: ControllerState,
    idle_timer: IdleResetTimer,
}

impl DeviceController {
    pub fn new(
        config: Config,
        mixer: Arc<dyn Mixer>,
        automation: Arc<dyn Automation>,
        commands: Sender<ControllerCommand>,
    ) -> Result<Self, ConfigError> {
        let default_target = config
            .default_target()
            .ok_or_else(|| ConfigError::Invalid("at least one target is required".to_string()))?
            .to_string();

        Ok(DeviceController {
            state: ControllerState::new(&default_target),
            default_target,
            config,
            mixer,
            automation,
            commands,
            idle_timer: IdleResetTimer::new(),
        })
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn idle_timer(&self) -> &IdleResetTimer {
        &self.idle_timer
    }

    pub fn handle(&mut self, command: ControllerCommand) {
        match command {
            ControllerCommand::Event(event) => self.handle_event(event),
            ControllerCommand::IdleReset { generation } => self.on_idle_reset(generation),
            ControllerCommand::Link(link) => self.on_link(link),
        }
    }

    pub fn shutdown(&mut self) {
        self.idle_timer.cancel();
    }

    fn handle_event(&mut self, event: DomainEvent) {
        debug!("Device event {:?}", event);

        match event {
            DomainEvent::EncoderPositionReset => {
                info!("Encoder position reset");
                self.state.last_encoder_position = 0;
            },
            DomainEvent::EncoderPosition { position, battery } => self.on_encoder_position(position, battery),
            DomainEvent::EncoderButton { gesture } => self.on_gesture(gesture),
            DomainEvent::DeviceSelect { target } => self.on_select(&target),
            DomainEvent::DeviceToggleMute { target } => self.on_toggle_mute(&target),
        }
    }

    fn target(&self, name: &str) -> Result<&TargetConfig, ConfigError> {
        self.config.targets.get(name).ok_or_else(|| ConfigError::UnknownTarget(name.to_string()))
    }

    fn on_encoder_position(&mut self, position: i64, battery: Option<u8>) {
        if let Some(percent) = battery {
            self.on_battery(percent);
        }

        let turned = direction(self.state.last_encoder_position, position);
        self.state.last_encoder_position = position;

        match turned {
            Some(turned) => {
                self.idle_timer.cancel();
                self.adjust_volume(turned);
                self.arm_idle_timer();
                self.refresh_presentation();
            },
            None => {
                debug!("Encoder position unchanged: {}", position);
                if battery.is_some() {
                    self.refresh_presentation();
                }
            },
        }
    }

    fn adjust_volume(&mut self, direction: Direction) {
        let name = self.state.selected_target.clone();
        let device = match self.target(&name) {
            Ok(target) => target.mixer_index,
            Err(err) => {
                warn!("Not adjusting volume: {}", err);
                return;
            },
        };

        match self.mixer.is_muted(device) {
            Ok(true) => {
                info!("{} is muted, not adjusting volume", name);
                return;
            },
            Ok(false) => {},
            Err(err) => {
                warn!("Failed to read mute state of {}: {}", name, err);
                return;
            },
        }

        let current = match self.mixer.volume(device) {
            Ok(volume) => volume,
            Err(err) => {
                warn!("Failed to read volume of {}: {}", name, err);
                return;
            },
        };

        let volume = next_volume(i32::from(current), direction, self.config.volume_step);
        if let Err(err) = self.mixer.set_volume(device, volume) {
            warn!("Failed to set volume of {}: {}", name, err);
            return;
        }
        info!("Volume of {} (device {}) set to {}", name, device, volume);

        if at_boundary(volume, direction) {
            let cue = match direction {
                Direction::Increase => &self.config.sound_cues.max_volume,
                Direction::Decrease => &self.config.sound_cues.min_volume,
            };
            self.play_cue(cue.as_deref());
        }
    }

    fn on_battery(&mut self, percent: u8) {
        self.state.last_battery_percent = Some(percent);

        if percent >= self.config.low_battery_threshold {
            if self.state.battery_alerted {
                info!("Battery level recovered to {}%", percent);
            }
            self.state.battery_alerted = false;
            return;
        }

        let alert = match self.config.battery_alert_policy {
            BatteryAlertPolicy::OncePerCrossing => !self.state.battery_alerted,
            BatteryAlertPolicy::EverySample => true,
        };
        self.state.battery_alerted = true;

        if alert {
            warn!("Battery low: {}%", percent);
            self.play_cue(self.config.sound_cues.low_battery.as_deref());
        }
    }

    fn on_gesture(&mut self, gesture: Gesture) {
        info!("Encoder button {:?}", gesture);

        match gesture {
            Gesture::SingleClick => {
                self.automation.press_media_key(MediaKey::PlayPause);
                self.play_cue(self.config.sound_cues.play_pause.as_deref());
            },
            Gesture::DoubleClick => self.automation.press_media_key(MediaKey::NextTrack),
            Gesture::MultiClick => self.automation.press_media_key(MediaKey::PreviousTrack),
            Gesture::LongPressRelease => match &self.config.companion_app {
                Some(path) => self.automation.launch_application(path),
                None => info!("No companion application configured"),
            },
        }
    }

    fn on_select(&mut self, name: &str) {
        if let Err(err) = self.target(name) {
            warn!("Ignoring target selection: {}", err);
            return;
        }

        info!("Selected target {}", name);
        self.state.selected_target = name.to_string();
        self.arm_idle_timer();
        self.play_cue(self.config.sound_cues.target_change.as_deref());
        self.refresh_presentation();
    }

    fn on_toggle_mute(&mut self, name: &str) {
        let device = match self.target(name) {
            Ok(target) => target.mixer_index,
            Err(err) => {
                warn!("Ignoring mute toggle: {}", err);
                return;
            },
        };

        match self.mixer.set_mute(device, MuteChange::Toggle) {
            Ok(muted) => info!("{} muted: {}", name, muted),
            Err(err) => warn!("Failed to toggle mute of {}: {}", name, err),
        }
        self.refresh_presentation();
    }

    fn on_idle_reset(&mut self, generation: u64) {
        if !self.idle_timer.take_fired(generation) {
            debug!("Ignoring superseded idle reset {}", generation);
            return;
        }

        info!("Inactivity detected - reset to {}", self.default_target);
        self.state.selected_target = self.default_target.clone();
        self.refresh_presentation();
    }

    fn on_link(&mut self, link: LinkStatus) {
        self.state.link = Some(link);
        self.refresh_presentation();
    }

    fn arm_idle_timer(&mut self) {
        let delay = Duration::from_secs(self.config.idle_reset_delay_secs);
        let mut commands = self.commands.clone();

        self.idle_timer.schedule(delay, move |generation| async move {
            if commands.send(ControllerCommand::IdleReset { generation }).await.is_err() {
                debug!("Device controller is gone, dropping idle reset");
            }
        });
    }

    fn play_cue(&self, cue: Option<&Path>) {
        if let Some(path) = cue {
            self.automation.play_sound_cue(path);
        }
    }

    /// Per target a volume or mute line, the selected one marked, then the battery level.
    pub fn tooltip(&self) -> String {
        let mut lines: Vec<String> = Vec::with_capacity(self.config.targets.len() + 1);

        for (name, target) in &self.config.targets {
            let marker = if *name == self.state.selected_target { SELECTED_MARKER } else { "" };

            let line = match self.mixer.is_muted(target.mixer_index) {
                Ok(true) => format!("{}{} is muted", marker, name),
                Ok(false) => match self.mixer.volume(target.mixer_index) {
                    Ok(volume) => format!("{}{}: {}%", marker, name, volume),
                    Err(_) => format!("{}{}: unavailable", marker, name),
                },
                Err(_) => format!("{}{}: unavailable", marker, name),
            };
            lines.push(line);
        }

        match self.state.last_battery_percent {
            Some(percent) => lines.push(format!("Battery level: {}%", percent)),
            None => lines.push("Battery level: unavailable".to_string()),
        }

        lines.join("\n")
    }

    fn refresh_presentation(&self) {
        let icons = &self.config.tray_icons;

        match self.state.link {
            Some(LinkStatus::Connected) => {
                self.automation.set_tray_tooltip(&self.tooltip());

                let icon = if self.state.battery_alerted {
                    icons.low_battery.as_ref()
                } else {
                    None
                };
                let icon = icon.or_else(|| {
                    self.config.targets.get(&self.state.selected_target).and_then(|target| target.icon.as_ref())
                });
                if let Some(icon) = icon {
                    self.automation.set_tray_icon(icon);
                }
            },
            Some(LinkStatus::Disconnected) | None => {
                let text = match self.state.link {
                    Some(_) => format!("Disconnected from {}", self.config.device_name),
                    None => format!("Searching for {}", self.config.device_name),
                };
                self.automation.set_tray_tooltip(&text);
                if let Some(icon) = &icons.loading {
                    self.automation.set_tray_icon(icon);
                }
            },
        }
    }
}

/// Spawns the task that owns the [`DeviceController`]. Every command sent to the returned sender
/// is handled to completion before the next one starts.
pub fn device_controller_task(
    cancel: CancellationToken,
    config: Config,
    mixer: Arc<dyn Mixer>,
    automation: Arc<dyn Automation>,
) -> Result<(Sender<ControllerCommand>, JoinHandle<()>), ConfigError> {
    let (sender, mut receiver) = channel::<ControllerCommand>(128);
    let mut controller = DeviceController::new(config, mixer, automation, sender.clone())?;

    let handle = spawn(async move {
        controller.refresh_presentation();

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                Some(command) = receiver.next() => {
                    controller.handle(command);
                },
            }
        }

        controller.shutdown();
    });

    Ok((sender, handle))
}
