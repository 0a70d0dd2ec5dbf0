use std::io;
use thiserror::Error;
use msgbox::IconType;
use std::fmt::Display;
use std::str::Utf8Error;
use btleplug;
use serde_json;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse config file: {source}")]
    JsonError { #[from] source: serde_json::Error },

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Unknown target {0:?}")]
    UnknownTarget(String),
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (runtime): {source}")]
    Runtime { #[from] source: io::Error },

    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed frame {0:?}")]
    Malformed(String),

    #[error("Unknown encoder button gesture {0:?}")]
    UnknownGesture(String),

    #[error("Frame is not valid utf-8")]
    NotUtf8,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("Bluetooth characteristic {0} is not available")]
    MissingCharacteristic(Uuid),

    #[error("Peripheral is not connected")]
    NotConnected,

    #[error("Transport operation took too long: {0}")]
    Timeout(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MixerError {
    #[error("Mixer device {0} does not exist")]
    UnknownDevice(u32),

    #[error("Mixer backend failure: {0}")]
    Backend(String),
}

pub fn error_msgbox<T: Display>(message: &'static str, error: &T) {
    let message = format!("{}: {}", message, error);
    eprintln!("{}", &message);
    if let Err(err) = msgbox::create(concat!("Tappie Control ", env!("CARGO_PKG_VERSION")), &message, IconType::Error) {
        eprintln!("Failed to create msgbox: {:?}", err);
    }
}
