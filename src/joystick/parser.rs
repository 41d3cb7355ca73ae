use std::time::Duration;

use super::{
    events::{Direction, JoystickEvents},
    pin_map::{ButtonId, PinMap},
    report::{ReportDiff, ReportError, ReportLayout, ReportSnapshot},
    side::Side,
    state::AggregateState,
    turntable::TurntableTracker,
    Timestamp,
};

/// What a single [`JoystickParser::parse`] call observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    /// Button bits that flipped.
    pub changed: u16,
    /// Turntable event fired during this call, if any.
    pub turntable: Option<Direction>,
}

impl ParseOutcome {
    pub fn has_events(&self) -> bool {
        self.changed != 0 || self.turntable.is_some()
    }
}

/// Decoder state for one attached controller.
///
/// Feed it every report with the time it was read; it dispatches button and
/// turntable transitions to its handler and keeps the aggregate output word.
pub struct JoystickParser<H> {
    side: Side,
    layout: ReportLayout,
    pins: PinMap,
    events: H,
    dispatch_hat: bool,
    turntable: TurntableTracker,
    previous_buttons: u16,
    previous_hat: Option<u8>,
    state: AggregateState,
}

impl<H: JoystickEvents> JoystickParser<H> {
    pub fn new(side: Side, pins: PinMap, events: H) -> Self {
        Self {
            side,
            layout: ReportLayout::default(),
            pins,
            events,
            dispatch_hat: false,
            turntable: TurntableTracker::default(),
            previous_buttons: 0,
            previous_hat: None,
            state: AggregateState::default(),
        }
    }

    pub fn with_layout(mut self, layout: ReportLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_turntable_timeout(mut self, timeout: Duration) -> Self {
        self.turntable = TurntableTracker::new(timeout);
        self
    }

    /// Dispatch hat switch changes instead of only recording them.
    pub fn with_hat_dispatch(mut self, enabled: bool) -> Self {
        self.dispatch_hat = enabled;
        self
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn state(&self) -> AggregateState {
        self.state
    }

    pub fn previous_buttons(&self) -> u16 {
        self.previous_buttons
    }

    pub fn previous_turntable(&self) -> Option<u8> {
        self.turntable.previous()
    }

    pub fn previous_hat(&self) -> Option<u8> {
        self.previous_hat
    }

    pub fn turntable_timeout(&self) -> Duration {
        self.turntable.timeout()
    }

    pub fn is_turning(&self) -> bool {
        self.turntable.is_turning()
    }

    pub fn events(&self) -> &H {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut H {
        &mut self.events
    }

    /// Decode one raw report.
    ///
    /// A report shorter than the layout requires is rejected before any state
    /// changes.
    pub fn parse(&mut self, buf: &[u8], now: Timestamp) -> Result<ParseOutcome, ReportError> {
        let report = self.layout.parse(buf)?;
        Ok(self.process(&report, now))
    }

    /// Decode an already parsed report.
    pub fn process(&mut self, report: &ReportSnapshot, now: Timestamp) -> ParseOutcome {
        let diff = ReportDiff::between(self.previous_buttons, self.turntable.previous(), report);

        let turntable = self.turntable.update(report.turntable, &diff, now);
        if let Some(direction) = turntable {
            self.state.set_direction(direction);
            self.events
                .on_turntable_changed(self.side, direction, report.payload);
        }

        for bit in diff.changed_bits() {
            let Some(button) = ButtonId::from_bit(bit) else {
                continue;
            };
            self.handle_button(button, report.buttons & button.mask() != 0);
        }
        self.previous_buttons = report.buttons;

        if let Some(hat) = report.hat {
            if self.dispatch_hat && self.previous_hat != Some(hat) {
                self.events.on_hat_switch(self.side, hat);
            }
            self.previous_hat = Some(hat);
        }

        ParseOutcome {
            changed: diff.changed,
            turntable,
        }
    }

    fn handle_button(&mut self, button: ButtonId, pressed: bool) {
        let pin = self.pins.pin(button);
        if pressed {
            self.events.on_button_down(self.side, button);
            if let Some(pin) = pin {
                self.state.assert_pin(pin);
            }
        } else {
            self.events.on_button_up(self.side, button);
            if let Some(pin) = pin {
                self.state.release_pin(pin);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::joystick::events::NullEvents;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Turntable(Side, i8, u8),
        Hat(Side, u8),
        Down(Side, u8),
        Up(Side, u8),
    }

    #[derive(Debug, Default)]
    struct Recorder(Vec<Event>);

    impl Recorder {
        fn take(&mut self) -> Vec<Event> {
            std::mem::take(&mut self.0)
        }
    }

    impl JoystickEvents for Recorder {
        fn on_turntable_changed(&mut self, side: Side, direction: Direction, payload: u8) {
            self.0
                .push(Event::Turntable(side, direction.sign(), payload));
        }

        fn on_hat_switch(&mut self, side: Side, hat: u8) {
            self.0.push(Event::Hat(side, hat));
        }

        fn on_button_down(&mut self, side: Side, button: ButtonId) {
            self.0.push(Event::Down(side, button.get()));
        }

        fn on_button_up(&mut self, side: Side, button: ButtonId) {
            self.0.push(Event::Up(side, button.get()));
        }
    }

    fn report(buttons: u16, turntable: u8) -> [u8; 8] {
        let [lo, hi] = buttons.to_le_bytes();
        [0x00, 0x00, lo, hi, 0x00, 0x00, turntable, 0x00]
    }

    fn parser() -> JoystickParser<Recorder> {
        JoystickParser::new(Side::Left, PinMap::default(), Recorder::default())
    }

    /// Parser that has consumed its startup turntable event.
    fn primed(turntable: u8, t0: Instant) -> JoystickParser<Recorder> {
        let mut p = parser();
        p.parse(&report(0, turntable), t0).unwrap();
        p.events_mut().take();
        p
    }

    #[test]
    fn first_report_emits_one_turntable_event() {
        let t0 = Instant::now();
        for value in [0u8, 5, 128, 255] {
            let mut p = parser();
            let outcome = p.parse(&report(0, value), t0).unwrap();
            let events = p.events_mut().take();
            assert_eq!(events.len(), 1, "value {value}");
            assert!(matches!(events[0], Event::Turntable(Side::Left, _, v) if v == value));
            assert_eq!(outcome.changed, 0);
            assert!(outcome.turntable.is_some());
        }

        let mut p = parser();
        p.parse(&report(0, 5), t0).unwrap();
        assert_eq!(p.events_mut().take(), vec![Event::Turntable(Side::Left, 1, 5)]);
    }

    #[test]
    fn repeated_report_is_silent() {
        let t0 = Instant::now();
        let mut p = primed(5, t0);
        let buf = report(0x0104, 9);

        p.parse(&buf, t0 + Duration::from_millis(10)).unwrap();
        assert!(!p.events_mut().take().is_empty());

        let outcome = p.parse(&buf, t0 + Duration::from_millis(20)).unwrap();
        assert!(!outcome.has_events());
        assert!(p.events_mut().take().is_empty());
    }

    #[test]
    fn turntable_signs() {
        let t0 = Instant::now();
        let cases = [(5u8, 7u8, 1i8), (7, 5, -1), (255, 1, 1), (1, 255, -1)];
        for (from, to, sign) in cases {
            let mut p = primed(from, t0);
            p.parse(&report(0, to), t0).unwrap();
            assert_eq!(
                p.events_mut().take(),
                vec![Event::Turntable(Side::Left, sign, to)],
                "{from} -> {to}"
            );
        }
    }

    #[test]
    fn stop_is_synthesized_once_after_timeout() {
        let t0 = Instant::now();
        let ms = |n| t0 + Duration::from_millis(n);
        let mut p = primed(5, t0);

        p.parse(&report(0, 7), ms(1000)).unwrap();
        p.events_mut().take();

        for at in [1001, 1100, 1199] {
            p.parse(&report(0, 7), ms(at)).unwrap();
            assert!(p.events_mut().take().is_empty(), "at {at}");
        }

        let outcome = p.parse(&report(0, 7), ms(1200)).unwrap();
        assert_eq!(outcome.turntable, Some(Direction::Stopped));
        assert_eq!(
            p.events_mut().take(),
            vec![Event::Turntable(Side::Left, 0, 7)]
        );
        assert!(!p.is_turning());

        p.parse(&report(0, 7), ms(2000)).unwrap();
        assert!(p.events_mut().take().is_empty());
    }

    #[test]
    fn late_poll_still_gets_stop() {
        let t0 = Instant::now();
        let mut p = primed(5, t0);
        p.parse(&report(0, 6), t0).unwrap();
        p.events_mut().take();

        p.parse(&report(0, 6), t0 + Duration::from_secs(3)).unwrap();
        assert_eq!(
            p.events_mut().take(),
            vec![Event::Turntable(Side::Left, 0, 6)]
        );
    }

    #[test]
    fn custom_timeout() {
        let t0 = Instant::now();
        let mut p = parser().with_turntable_timeout(Duration::from_millis(50));
        assert_eq!(p.turntable_timeout(), Duration::from_millis(50));
        p.parse(&report(0, 1), t0).unwrap();
        p.events_mut().take();
        p.parse(&report(0, 1), t0 + Duration::from_millis(50)).unwrap();
        assert_eq!(
            p.events_mut().take(),
            vec![Event::Turntable(Side::Left, 0, 1)]
        );
    }

    #[test]
    fn buttons_fire_in_ascending_order() {
        let t0 = Instant::now();
        let mut p = primed(0, t0);
        let both = (1 << 2) | (1 << 8);

        p.parse(&report(both, 0), t0).unwrap();
        assert_eq!(
            p.events_mut().take(),
            vec![Event::Down(Side::Left, 3), Event::Down(Side::Left, 9)]
        );

        p.parse(&report(0, 0), t0).unwrap();
        assert_eq!(
            p.events_mut().take(),
            vec![Event::Up(Side::Left, 3), Event::Up(Side::Left, 9)]
        );
    }

    #[test]
    fn turntable_event_precedes_buttons() {
        let t0 = Instant::now();
        let mut p = primed(0, t0);
        p.parse(&report(1 << 15, 3), t0).unwrap();
        assert_eq!(
            p.events_mut().take(),
            vec![
                Event::Turntable(Side::Left, 1, 3),
                Event::Down(Side::Left, 16)
            ]
        );
    }

    #[test]
    fn press_release_restores_state() {
        let t0 = Instant::now();
        let mut p = primed(0, t0);
        p.parse(&report(1 << 4, 0), t0).unwrap();
        let before = p.state();

        // button 1 -> pin 8 -> bit 8
        p.parse(&report((1 << 4) | 1, 0), t0).unwrap();
        assert_eq!(p.state().bits(), before.bits() | 0x0100);

        p.parse(&report(1 << 4, 0), t0).unwrap();
        assert_eq!(p.state(), before);
    }

    #[test]
    fn default_table_state_bits() {
        let t0 = Instant::now();
        let mut p = primed(0, t0);
        // buttons 4 (pin 9), 11 (pin 2) and 16 (pin 1)
        p.parse(&report((1 << 3) | (1 << 10) | (1 << 15), 0), t0)
            .unwrap();
        assert_eq!(p.state().bits() & 0x3FFF, 0x0200 | 0x0002 | 0x0001);
    }

    #[test]
    fn unmapped_button_leaves_state_alone() {
        let t0 = Instant::now();
        let mut p = primed(0, t0);
        let before = p.state();

        p.parse(&report(1 << 1, 0), t0).unwrap();
        assert_eq!(p.events_mut().take(), vec![Event::Down(Side::Left, 2)]);
        assert_eq!(p.state(), before);

        p.parse(&report(0, 0), t0).unwrap();
        assert_eq!(p.events_mut().take(), vec![Event::Up(Side::Left, 2)]);
        assert_eq!(p.state(), before);
    }

    #[test]
    fn turntable_direction_lands_in_top_bits() {
        let t0 = Instant::now();
        let mut p = primed(10, t0);

        p.parse(&report(0, 11), t0).unwrap();
        assert_eq!(p.state().bits() & 0xC000, 0x8000);

        p.parse(&report(0, 9), t0).unwrap();
        assert_eq!(p.state().bits() & 0xC000, 0x4000);

        p.parse(&report(0, 9), t0 + Duration::from_millis(200))
            .unwrap();
        assert_eq!(p.state().bits() & 0xC000, 0);
    }

    #[test]
    fn short_report_is_rejected_without_touching_state() {
        let t0 = Instant::now();
        let mut p = primed(3, t0);
        let err = p.parse(&[0; 4], t0).unwrap_err();
        assert_eq!(
            err,
            ReportError::InvalidLength {
                expected: 7,
                actual: 4
            }
        );
        assert_eq!(p.previous_turntable(), Some(3));
        assert!(p.events_mut().take().is_empty());
    }

    #[test]
    fn previous_fields_track_last_report() {
        let t0 = Instant::now();
        let mut p = parser();
        p.parse(&report(0xBEEF, 0x42), t0).unwrap();
        assert_eq!(p.previous_buttons(), 0xBEEF);
        assert_eq!(p.previous_turntable(), Some(0x42));
    }

    #[test]
    fn absent_handler_still_updates_state() {
        let t0 = Instant::now();
        let mut p = JoystickParser::new(Side::Right, PinMap::default(), None::<NullEvents>);
        p.parse(&report(0, 0), t0).unwrap();
        p.parse(&report(1, 1), t0).unwrap();
        assert_eq!(p.state().bits(), 0x8000 | 0x0100);
        assert_eq!(p.previous_buttons(), 1);
        assert!(p.is_turning());

        p.parse(&report(1, 1), t0 + Duration::from_millis(250))
            .unwrap();
        assert_eq!(p.state().bits(), 0x0100);
        assert!(!p.is_turning());
    }

    #[test]
    fn events_carry_side() {
        let t0 = Instant::now();
        let mut p = JoystickParser::new(Side::Right, PinMap::default(), Recorder::default());
        p.parse(&report(0, 0), t0).unwrap();
        p.events_mut().take();
        p.parse(&report(1, 0), t0).unwrap();
        assert_eq!(p.events_mut().take(), vec![Event::Down(Side::Right, 1)]);
    }

    #[test]
    fn hat_is_recorded_but_only_dispatched_when_enabled() {
        let t0 = Instant::now();
        let layout = ReportLayout {
            hat: Some(4),
            ..Default::default()
        };
        let mut buf = report(0, 0);
        buf[4] = 0x02;

        let mut p = parser().with_layout(layout);
        p.parse(&buf, t0).unwrap();
        assert_eq!(p.previous_hat(), Some(0x02));
        assert!(!p
            .events_mut()
            .take()
            .iter()
            .any(|e| matches!(e, Event::Hat(..))));

        let mut p = parser().with_layout(layout).with_hat_dispatch(true);
        p.parse(&buf, t0).unwrap();
        p.parse(&buf, t0).unwrap();
        let hats: Vec<_> = p
            .events_mut()
            .take()
            .into_iter()
            .filter(|e| matches!(e, Event::Hat(..)))
            .collect();
        assert_eq!(hats, vec![Event::Hat(Side::Left, 0x02)]);
    }
}
