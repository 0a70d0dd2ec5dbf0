use std::collections::HashSet;
use std::path::PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::constants::{
    DEFAULT_DEVICE_NAME, TAPPIE_DOUBLE_BUTTON_CHARACTERISTIC, TAPPIE_ENCODER_BUTTON_CHARACTERISTIC,
    TAPPIE_ENCODER_POSITION_CHARACTERISTIC, TAPPIE_SERVICE, TAPPIE_SINGLE_BUTTON_CHARACTERISTIC,
};
use crate::error::ConfigError;

/// When to raise a low battery alert while the battery stays below the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatteryAlertPolicy {
    /// Alert once when the level drops below the threshold, re-arm once it is back above.
    OncePerCrossing,
    /// Alert on every battery sample below the threshold.
    EverySample,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    pub mixer_index: u32,
    #[serde(default)]
    pub icon: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacteristicsConfig {
    pub service: Uuid,
    pub encoder_position: Uuid,
    pub encoder_button: Uuid,
    pub single_button: Uuid,
    pub double_button: Uuid,
}

impl Default for CharacteristicsConfig {
    fn default() -> Self {
        CharacteristicsConfig {
            service: Uuid::from_u128(TAPPIE_SERVICE),
            encoder_position: Uuid::from_u128(TAPPIE_ENCODER_POSITION_CHARACTERISTIC),
            encoder_button: Uuid::from_u128(TAPPIE_ENCODER_BUTTON_CHARACTERISTIC),
            single_button: Uuid::from_u128(TAPPIE_SINGLE_BUTTON_CHARACTERISTIC),
            double_button: Uuid::from_u128(TAPPIE_DOUBLE_BUTTON_CHARACTERISTIC),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoundCuesConfig {
    pub max_volume: Option<PathBuf>,
    pub min_volume: Option<PathBuf>,
    pub play_pause: Option<PathBuf>,
    pub target_change: Option<PathBuf>,
    pub low_battery: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrayIconsConfig {
    pub loading: Option<PathBuf>,
    pub low_battery: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub device_name: String,
    pub reconnect_delay_secs: u64,
    pub idle_reset_delay_secs: u64,
    pub volume_step: u8,
    pub low_battery_threshold: u8,
    pub battery_alert_policy: BatteryAlertPolicy,
    /// The first target is the one selected at start-up and after an idle reset.
    pub targets: IndexMap<String, TargetConfig>,
    pub characteristics: CharacteristicsConfig,
    pub sound_cues: SoundCuesConfig,
    pub tray_icons: TrayIconsConfig,
    pub companion_app: Option<PathBuf>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::Invalid("at least one target is required".to_string()));
        }

        if !(1..=100).contains(&self.volume_step) {
            return Err(ConfigError::Invalid(format!("volumeStep must be within 1..=100, got {}", self.volume_step)));
        }

        if self.low_battery_threshold > 100 {
            return Err(ConfigError::Invalid(format!(
                "lowBatteryThreshold must be a percentage, got {}",
                self.low_battery_threshold
            )));
        }

        let chars = &self.characteristics;
        let unique: HashSet<Uuid> = [chars.encoder_position, chars.encoder_button, chars.single_button, chars.double_button]
            .into_iter()
            .collect();
        if unique.len() != 4 {
            return Err(ConfigError::Invalid("characteristic identifiers must be distinct".to_string()));
        }

        Ok(())
    }

    pub fn default_target(&self) -> Option<&str> {
        self.targets.keys().next().map(String::as_str)
    }
}

fn target(mixer_index: u32) -> TargetConfig {
    TargetConfig { mixer_index, icon: None }
}

impl Default for Config {
    fn default() -> Self {
        let mut targets = IndexMap::new();
        targets.insert("Master".to_string(), target(15));
        targets.insert("Gaming".to_string(), target(17));
        targets.insert("Aux".to_string(), target(13));
        targets.insert("Media".to_string(), target(9));
        targets.insert("Chat".to_string(), target(11));

        Config {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            reconnect_delay_secs: 15,
            idle_reset_delay_secs: 10,
            volume_step: 5,
            low_battery_threshold: 20,
            battery_alert_policy: BatteryAlertPolicy::OncePerCrossing,
            targets,
            characteristics: CharacteristicsConfig::default(),
            sound_cues: SoundCuesConfig::default(),
            tray_icons: TrayIconsConfig::default(),
            companion_app: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_target(), Some("Master"));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{
            "deviceName": "TappieTest",
            "targets": { "Speakers": { "mixerIndex": 3 }, "Headset": { "mixerIndex": 4, "icon": "headset.ico" } },
            "batteryAlertPolicy": "everySample"
        }"#).unwrap();

        assert_eq!(config.device_name, "TappieTest");
        assert_eq!(config.reconnect_delay_secs, 15);
        assert_eq!(config.battery_alert_policy, BatteryAlertPolicy::EverySample);
        assert_eq!(config.default_target(), Some("Speakers"));
        assert_eq!(config.targets["Headset"].icon, Some(PathBuf::from("headset.ico")));
        assert_eq!(config.characteristics, CharacteristicsConfig::default());
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = Config::default();
        config.volume_step = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.targets.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.characteristics.double_button = config.characteristics.single_button;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.low_battery_threshold = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
