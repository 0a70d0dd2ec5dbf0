use uuid::Uuid;

use crate::config::types::CharacteristicsConfig;

/// The four notification sources the peripheral exposes, one per event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    EncoderPosition,
    EncoderButton,
    SingleButton,
    DoubleButton,
}

impl Characteristic {
    pub const ALL: [Characteristic; 4] = [
        Characteristic::EncoderPosition,
        Characteristic::EncoderButton,
        Characteristic::SingleButton,
        Characteristic::DoubleButton,
    ];

    pub fn uuid(&self, config: &CharacteristicsConfig) -> Uuid {
        match self {
            Characteristic::EncoderPosition => config.encoder_position,
            Characteristic::EncoderButton => config.encoder_button,
            Characteristic::SingleButton => config.single_button,
            Characteristic::DoubleButton => config.double_button,
        }
    }

    pub fn from_uuid(uuid: &Uuid, config: &CharacteristicsConfig) -> Option<Characteristic> {
        Characteristic::ALL.into_iter().find(|characteristic| characteristic.uuid(config) == *uuid)
    }
}

impl std::fmt::Display for Characteristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            Characteristic::EncoderPosition => "encoder position",
            Characteristic::EncoderButton => "encoder button",
            Characteristic::SingleButton => "single button",
            Characteristic::DoubleButton => "double button",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    SingleClick,
    DoubleClick,
    MultiClick,
    LongPressRelease,
}

/// One decoded notification frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    EncoderPosition { position: i64, battery: Option<u8> },
    EncoderPositionReset,
    EncoderButton { gesture: Gesture },
    DeviceSelect { target: String },
    DeviceToggleMute { target: String },
}

/// A raw value notification as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub uuid: Uuid,
    pub value: Vec<u8>,
}

/// The externally visible phase of the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Idle,
    Scanning,
    Connecting,
    Subscribing,
    Monitoring,
    Disconnected,
}
