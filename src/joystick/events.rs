use std::fmt;

use super::{pin_map::ButtonId, side::Side};

/// Turntable rotation reported with each turntable event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    CounterClockwise,
    Stopped,
    Clockwise,
}

impl Direction {
    /// Three-way sign of a turntable delta.
    pub fn from_delta(delta: i8) -> Self {
        match delta.signum() {
            1 => Direction::Clockwise,
            -1 => Direction::CounterClockwise,
            _ => Direction::Stopped,
        }
    }

    pub fn sign(self) -> i8 {
        match self {
            Direction::CounterClockwise => -1,
            Direction::Stopped => 0,
            Direction::Clockwise => 1,
        }
    }

    /// Two-bit code kept in the top bits of the aggregate state word.
    pub fn state_code(self) -> u16 {
        match self {
            Direction::Stopped => 0b00,
            Direction::CounterClockwise => 0b01,
            Direction::Clockwise => 0b10,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::CounterClockwise => f.write_str("<-"),
            Direction::Stopped => f.write_str("--"),
            Direction::Clockwise => f.write_str("->"),
        }
    }
}

/// Receiver of decoded controller events.
///
/// This is the only path from the decoder to anything that drives outputs.
pub trait JoystickEvents {
    fn on_turntable_changed(&mut self, side: Side, direction: Direction, payload: u8);

    /// Hat switch changes. Only called when hat dispatch is enabled.
    fn on_hat_switch(&mut self, _side: Side, _hat: u8) {}

    fn on_button_down(&mut self, side: Side, button: ButtonId);

    fn on_button_up(&mut self, side: Side, button: ButtonId);
}

/// Handler that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEvents;

impl JoystickEvents for NullEvents {
    fn on_turntable_changed(&mut self, _side: Side, _direction: Direction, _payload: u8) {}
    fn on_button_down(&mut self, _side: Side, _button: ButtonId) {}
    fn on_button_up(&mut self, _side: Side, _button: ButtonId) {}
}

impl<T: JoystickEvents> JoystickEvents for Option<T> {
    fn on_turntable_changed(&mut self, side: Side, direction: Direction, payload: u8) {
        if let Some(inner) = self {
            inner.on_turntable_changed(side, direction, payload);
        }
    }

    fn on_hat_switch(&mut self, side: Side, hat: u8) {
        if let Some(inner) = self {
            inner.on_hat_switch(side, hat);
        }
    }

    fn on_button_down(&mut self, side: Side, button: ButtonId) {
        if let Some(inner) = self {
            inner.on_button_down(side, button);
        }
    }

    fn on_button_up(&mut self, side: Side, button: ButtonId) {
        if let Some(inner) = self {
            inner.on_button_up(side, button);
        }
    }
}

impl<T: JoystickEvents + ?Sized> JoystickEvents for &mut T {
    fn on_turntable_changed(&mut self, side: Side, direction: Direction, payload: u8) {
        (**self).on_turntable_changed(side, direction, payload);
    }

    fn on_hat_switch(&mut self, side: Side, hat: u8) {
        (**self).on_hat_switch(side, hat);
    }

    fn on_button_down(&mut self, side: Side, button: ButtonId) {
        (**self).on_button_down(side, button);
    }

    fn on_button_up(&mut self, side: Side, button: ButtonId) {
        (**self).on_button_up(side, button);
    }
}

impl<T: JoystickEvents + ?Sized> JoystickEvents for Box<T> {
    fn on_turntable_changed(&mut self, side: Side, direction: Direction, payload: u8) {
        (**self).on_turntable_changed(side, direction, payload);
    }

    fn on_hat_switch(&mut self, side: Side, hat: u8) {
        (**self).on_hat_switch(side, hat);
    }

    fn on_button_down(&mut self, side: Side, button: ButtonId) {
        (**self).on_button_down(side, button);
    }

    fn on_button_up(&mut self, side: Side, button: ButtonId) {
        (**self).on_button_up(side, button);
    }
}

/// Logs every dispatched event, then forwards it to `inner`.
#[derive(Debug, Default)]
pub struct TracingEvents<H> {
    inner: H,
}

impl<H> TracingEvents<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: JoystickEvents> JoystickEvents for TracingEvents<H> {
    fn on_turntable_changed(&mut self, side: Side, direction: Direction, payload: u8) {
        tracing::info!(%side, %direction, payload = format_args!("0x{payload:02X}"), "turntable");
        self.inner.on_turntable_changed(side, direction, payload);
    }

    fn on_hat_switch(&mut self, side: Side, hat: u8) {
        tracing::info!(%side, hat = format_args!("0x{hat:02X}"), "hat switch");
        self.inner.on_hat_switch(side, hat);
    }

    fn on_button_down(&mut self, side: Side, button: ButtonId) {
        tracing::info!(%side, %button, "button down");
        self.inner.on_button_down(side, button);
    }

    fn on_button_up(&mut self, side: Side, button: ButtonId) {
        tracing::info!(%side, %button, "button up");
        self.inner.on_button_up(side, button);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_from_delta_is_three_way_sign() {
        assert_eq!(Direction::from_delta(2), Direction::Clockwise);
        assert_eq!(Direction::from_delta(127), Direction::Clockwise);
        assert_eq!(Direction::from_delta(-128), Direction::CounterClockwise);
        assert_eq!(Direction::from_delta(0), Direction::Stopped);
        assert_eq!(Direction::Clockwise.sign(), 1);
        assert_eq!(Direction::CounterClockwise.sign(), -1);
    }

    #[test]
    fn state_codes() {
        assert_eq!(Direction::Stopped.state_code(), 0);
        assert_eq!(Direction::CounterClockwise.state_code(), 1);
        assert_eq!(Direction::Clockwise.state_code(), 2);
    }

    #[derive(Default)]
    struct Count(usize);

    impl JoystickEvents for Count {
        fn on_turntable_changed(&mut self, _: Side, _: Direction, _: u8) {
            self.0 += 1;
        }
        fn on_button_down(&mut self, _: Side, _: ButtonId) {
            self.0 += 1;
        }
        fn on_button_up(&mut self, _: Side, _: ButtonId) {
            self.0 += 1;
        }
    }

    #[test]
    fn wrappers_forward() {
        let button = ButtonId::new(1).unwrap();

        let mut absent: Option<Count> = None;
        absent.on_button_down(Side::Left, button);

        let mut present = Some(Count::default());
        present.on_button_down(Side::Left, button);
        assert_eq!(present.as_ref().map(|c| c.0), Some(1));

        let mut traced = TracingEvents::new(Count::default());
        traced.on_turntable_changed(Side::Right, Direction::Clockwise, 0);
        traced.on_button_up(Side::Right, button);
        traced.on_hat_switch(Side::Right, 4);
        assert_eq!(traced.into_inner().0, 2);

        let mut boxed: Box<dyn JoystickEvents> = Box::new(Count::default());
        boxed.on_button_down(Side::Left, button);
    }
}
