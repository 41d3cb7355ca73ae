use std::fmt;

use super::{events::Direction, pin_map::PinId};

const DIRECTION_SHIFT: u16 = 14;
const DIRECTION_MASK: u16 = 0b11 << DIRECTION_SHIFT;

/// Bitmask of currently asserted outputs.
///
/// Bits 0..=13 mirror pins (see [`PinId::state_bit`]), bits 14..=15 hold the
/// turntable direction code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AggregateState(u16);

impl AggregateState {
    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn is_pin_asserted(self, pin: PinId) -> bool {
        self.0 & (1 << pin.state_bit()) != 0
    }

    pub fn direction(self) -> Direction {
        match (self.0 & DIRECTION_MASK) >> DIRECTION_SHIFT {
            0b01 => Direction::CounterClockwise,
            0b10 => Direction::Clockwise,
            _ => Direction::Stopped,
        }
    }

    pub(crate) fn assert_pin(&mut self, pin: PinId) {
        self.0 |= 1 << pin.state_bit();
    }

    pub(crate) fn release_pin(&mut self, pin: PinId) {
        self.0 &= !(1 << pin.state_bit());
    }

    pub(crate) fn set_direction(&mut self, direction: Direction) {
        self.0 = (self.0 & !DIRECTION_MASK) | (direction.state_code() << DIRECTION_SHIFT);
    }
}

impl fmt::Display for AggregateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}
