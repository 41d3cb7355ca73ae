use std::{cell::RefCell, rc::Rc};

use midir::{MidiOutput, MidiOutputConnection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::ConfigError,
    joystick::{ButtonId, Direction, JoystickEvents, PinMap, Side, MAX_PIN},
};

const CLIENT_NAME: &str = "twin-turntable-bridge";
const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;
const VELOCITY_ON: u8 = 0x7F;
const MAX_NOTE: u8 = 0x7F;

/// MIDI port and output line numbering.
///
/// Every output line is sent as a MIDI note: asserting a line sends note on,
/// releasing it sends note off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MidiSettings {
    /// Case-insensitive substring of the output port name. Empty picks the first port.
    pub port: String,
    pub channel: u8,
    /// Base line for buttons 8 and up.
    pub left_button_offset: u8,
    /// Base line for buttons 1..=7.
    pub left_fn_offset: u8,
    pub right_button_offset: u8,
    pub right_fn_offset: u8,
    pub left_ccw: u8,
    pub left_cw: u8,
    pub right_ccw: u8,
    pub right_cw: u8,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            channel: 0,
            left_button_offset: 22,
            left_fn_offset: 22,
            right_button_offset: 39,
            right_fn_offset: 30,
            left_ccw: 20,
            left_cw: 21,
            right_ccw: 48,
            right_cw: 49,
        }
    }
}

impl MidiSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel > 15 {
            return Err(ConfigError::InvalidChannel(self.channel));
        }

        let highest_button_line = [
            self.left_button_offset,
            self.left_fn_offset,
            self.right_button_offset,
            self.right_fn_offset,
        ]
        .into_iter()
        .map(|offset| u16::from(offset) + u16::from(MAX_PIN))
        .max()
        .unwrap_or(0);
        if highest_button_line > u16::from(MAX_NOTE) {
            return Err(ConfigError::LineOutOfRange(highest_button_line));
        }

        for line in [self.left_ccw, self.left_cw, self.right_ccw, self.right_cw] {
            if line > MAX_NOTE {
                return Err(ConfigError::LineOutOfRange(line.into()));
            }
        }
        Ok(())
    }
}

/// A single output line changing level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineChange {
    pub line: u8,
    pub asserted: bool,
}

impl LineChange {
    pub fn midi_message(self, channel: u8) -> [u8; 3] {
        if self.asserted {
            [NOTE_ON | channel, self.line, VELOCITY_ON]
        } else {
            [NOTE_OFF | channel, self.line, 0]
        }
    }
}

/// Maps decoded events to output lines.
#[derive(Debug, Clone)]
pub struct OutputLines {
    settings: MidiSettings,
    pins: PinMap,
}

impl OutputLines {
    pub fn new(settings: MidiSettings, pins: PinMap) -> Self {
        Self { settings, pins }
    }

    /// Line driven by `button`, or `None` when the button has no pin.
    pub fn button_line(&self, side: Side, button: ButtonId) -> Option<u8> {
        let pin = self.pins.pin(button)?;
        let s = &self.settings;
        let offset = match (side, button.get() >= 8) {
            (Side::Left, true) => s.left_button_offset,
            (Side::Left, false) => s.left_fn_offset,
            (Side::Right, true) => s.right_button_offset,
            (Side::Right, false) => s.right_fn_offset,
        };
        Some(offset + pin.get())
    }

    pub fn button(&self, side: Side, button: ButtonId, pressed: bool) -> Option<LineChange> {
        self.button_line(side, button).map(|line| LineChange {
            line,
            asserted: pressed,
        })
    }

    /// Counter-clockwise line first, then clockwise.
    pub fn turntable(&self, side: Side, direction: Direction) -> [LineChange; 2] {
        let (ccw, cw) = match side {
            Side::Left => (self.settings.left_ccw, self.settings.left_cw),
            Side::Right => (self.settings.right_ccw, self.settings.right_cw),
        };
        [
            LineChange {
                line: ccw,
                asserted: direction == Direction::CounterClockwise,
            },
            LineChange {
                line: cw,
                asserted: direction == Direction::Clockwise,
            },
        ]
    }
}

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("failed to initialise MIDI output: {0}")]
    MidiInit(#[from] midir::InitError),
    #[error("no MIDI output port matching \"{0}\" was found")]
    PortNotFound(String),
    #[error("failed to open MIDI connection: {0}")]
    Connection(String),
}

/// Names of the available MIDI output ports.
pub fn list_ports() -> Result<Vec<String>, ActuatorError> {
    let midi_out = MidiOutput::new(CLIENT_NAME)?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect())
}

/// Drives output lines over a MIDI connection.
///
/// Clones share the connection, so both controllers can drive one port.
#[derive(Clone)]
pub struct MidiActuator {
    connection: Rc<RefCell<MidiOutputConnection>>,
    lines: OutputLines,
    channel: u8,
    port_name: Rc<str>,
}

impl MidiActuator {
    pub fn connect(settings: &MidiSettings, pins: PinMap) -> Result<Self, ActuatorError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let ports = midi_out.ports();

        if ports.is_empty() {
            return Err(ActuatorError::PortNotFound(settings.port.clone()));
        }

        let target_port = if settings.port.trim().is_empty() {
            ports[0].clone()
        } else {
            let hint = settings.port.to_lowercase();
            ports
                .iter()
                .find(|port| {
                    midi_out
                        .port_name(port)
                        .map(|name| name.to_lowercase().contains(&hint))
                        .unwrap_or(false)
                })
                .cloned()
                .ok_or_else(|| ActuatorError::PortNotFound(settings.port.clone()))?
        };

        let port_name = midi_out
            .port_name(&target_port)
            .unwrap_or_else(|_| "<unknown>".into());

        let connection = midi_out
            .connect(&target_port, "twin-turntable-bridge-out")
            .map_err(|err| ActuatorError::Connection(err.to_string()))?;

        Ok(Self {
            connection: Rc::new(RefCell::new(connection)),
            lines: OutputLines::new(settings.clone(), pins),
            channel: settings.channel,
            port_name: port_name.into(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn send(&self, change: LineChange) {
        let message = change.midi_message(self.channel);
        if let Err(err) = self.connection.borrow_mut().send(&message) {
            tracing::warn!(
                port = %self.port_name,
                line = change.line,
                error = %err,
                "failed to send MIDI message"
            );
        }
    }
}

impl JoystickEvents for MidiActuator {
    fn on_turntable_changed(&mut self, side: Side, direction: Direction, _payload: u8) {
        for change in self.lines.turntable(side, direction) {
            self.send(change);
        }
    }

    fn on_button_down(&mut self, side: Side, button: ButtonId) {
        match self.lines.button(side, button, true) {
            Some(change) => self.send(change),
            None => tracing::debug!(%side, %button, "button has no output line"),
        }
    }

    fn on_button_up(&mut self, side: Side, button: ButtonId) {
        if let Some(change) = self.lines.button(side, button, false) {
            self.send(change);
        }
    }
}
