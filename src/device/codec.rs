use std::str;
use log::{debug, warn};

use crate::device::constants::{
    FRAME_RELEASE, FRAME_RESET, GESTURE_DOUBLE_CLICK, GESTURE_LONG_PRESS_RELEASE, GESTURE_MULTI_CLICK,
    GESTURE_SINGLE_CLICK,
};
use crate::device::types::{Characteristic, DomainEvent, Gesture};
use crate::error::DecodeError;

/// Decodes one notification frame. `Ok(None)` is a frame that carries no event (button release).
pub fn decode(characteristic: Characteristic, raw: &[u8]) -> Result<Option<DomainEvent>, DecodeError> {
    let text = str::from_utf8(raw).map_err(|_| DecodeError::NotUtf8)?;
    // the firmware pads some frames with NUL bytes
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');

    match characteristic {
        Characteristic::EncoderPosition => decode_encoder_position(text).map(Some),
        Characteristic::EncoderButton => decode_gesture(text).map(|gesture| Some(DomainEvent::EncoderButton { gesture })),
        Characteristic::SingleButton => {
            decode_button(text).map(|target| target.map(|target| DomainEvent::DeviceSelect { target }))
        },
        Characteristic::DoubleButton => {
            decode_button(text).map(|target| target.map(|target| DomainEvent::DeviceToggleMute { target }))
        },
    }
}

fn decode_encoder_position(text: &str) -> Result<DomainEvent, DecodeError> {
    let (position, battery) = match text.split_once(char::is_whitespace) {
        Some((position, battery)) => (position, Some(battery.trim())),
        None => (text, None),
    };

    if position == FRAME_RESET {
        if let Some(battery) = battery {
            debug!("Ignoring battery level {:?} sent along with an encoder reset", battery);
        }
        return Ok(DomainEvent::EncoderPositionReset);
    }

    let position: i64 = position
        .parse()
        .map_err(|_| DecodeError::Malformed(text.to_string()))?;

    let battery = battery.and_then(|battery| match battery.parse::<u8>() {
        Ok(percent) if percent <= 100 => Some(percent),
        _ => {
            warn!("Malformed battery level {:?} in encoder frame {:?}", battery, text);
            None
        },
    });

    Ok(DomainEvent::EncoderPosition { position, battery })
}

fn decode_gesture(text: &str) -> Result<Gesture, DecodeError> {
    match text {
        GESTURE_SINGLE_CLICK => Ok(Gesture::SingleClick),
        GESTURE_DOUBLE_CLICK => Ok(Gesture::DoubleClick),
        GESTURE_MULTI_CLICK => Ok(Gesture::MultiClick),
        GESTURE_LONG_PRESS_RELEASE => Ok(Gesture::LongPressRelease),
        other => Err(DecodeError::UnknownGesture(other.to_string())),
    }
}

// anything but the release frame names a target, unknown names are left to the controller
fn decode_button(text: &str) -> Result<Option<String>, DecodeError> {
    match text {
        FRAME_RELEASE => Ok(None),
        target => Ok(Some(target.to_string())),
    }
}
