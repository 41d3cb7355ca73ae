//! Decoder and bridge for a pair of turntable HID controllers.
//!
//! [`joystick::JoystickParser`] turns successive input reports into button
//! and turntable events; [`joystick::DeviceBridge`] runs one parser per
//! attached controller and [`actuator::MidiActuator`] turns the events into
//! output lines.

pub mod actuator;
pub mod config;
pub mod joystick;
