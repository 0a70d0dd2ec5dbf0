use crate::device::types::DomainEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

/// Everything the device controller task consumes, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerCommand {
    Event(DomainEvent),
    IdleReset { generation: u64 },
    Link(LinkStatus),
}

/// State owned by the controller task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    pub selected_target: String,
    pub last_encoder_position: i64,
    pub last_battery_percent: Option<u8>,
    // a low battery alert was raised and the level has not recovered since
    pub battery_alerted: bool,
    pub link: Option<LinkStatus>,
}

impl ControllerState {
    pub fn new(default_target: &str) -> Self {
        ControllerState {
            selected_target: default_target.to_string(),
            last_encoder_position: 0,
            last_battery_percent: None,
            battery_alerted: false,
            link: None,
        }
    }
}
