//! Volume arithmetic for encoder steps.

pub const MIN_VOLUME: i32 = 0;
pub const MAX_VOLUME: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
}

/// Which way the encoder turned; None if it did not move.
pub fn direction(last_position: i64, position: i64) -> Option<Direction> {
    if position > last_position {
        Some(Direction::Increase)
    } else if position < last_position {
        Some(Direction::Decrease)
    } else {
        None
    }
}

/// Rounds to the nearest multiple of `step`, halfway cases away from zero.
pub fn round_to_step(x: i32, step: u8) -> i32 {
    if step == 0 {
        return x;
    }
    let step = i32::from(step);
    ((f64::from(x) / f64::from(step)).round() as i32).saturating_mul(step)
}

/// The volume after one encoder step, always within `0..=100`.
pub fn next_volume(current: i32, direction: Direction, step: u8) -> u8 {
    let base = round_to_step(current, step);
    let step = i32::from(step);
    let next = match direction {
        Direction::Increase => base.saturating_add(step),
        Direction::Decrease => base.saturating_sub(step),
    };
    next.clamp(MIN_VOLUME, MAX_VOLUME) as u8
}

/// True if `volume` is the end of the range in the direction of travel.
pub fn at_boundary(volume: u8, direction: Direction) -> bool {
    match direction {
        Direction::Increase => i32::from(volume) >= MAX_VOLUME,
        Direction::Decrease => i32::from(volume) <= MIN_VOLUME,
    }
}
