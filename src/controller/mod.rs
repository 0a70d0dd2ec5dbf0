pub mod device_controller;
pub mod timer;
pub mod types;
pub mod volume;
