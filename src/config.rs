use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    actuator::MidiSettings,
    joystick::{
        ButtonId, DeviceSettings, JoystickEvents, JoystickParser, PinMap, ReportLayout, Side,
        SideRule, MAX_REPORT_LEN,
    },
};

pub const DEFAULT_CONFIG_PATH: &str = "bridge.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("button id {0} is outside 1..=16")]
    InvalidButton(u8),
    #[error("button {button} maps to pin {pin}, which is outside 1..=13")]
    InvalidPin { button: ButtonId, pin: u8 },
    #[error("report layout needs {0} bytes, more than a device report can carry")]
    LayoutTooLong(usize),
    #[error("MIDI channel {0} is outside 0..=15")]
    InvalidChannel(u8),
    #[error("output line {0} does not fit in a MIDI note")]
    LineOutOfRange(u16),
    #[error("turntable timeout must be greater than zero")]
    ZeroTimeout,
}

/// Bridge configuration, read from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub device: DeviceSettings,
    pub layout: ReportLayout,
    pub turntable_timeout_ms: u64,
    /// Button id to pin id. Pin 0 or a missing entry leaves a button unassigned.
    pub pins: BTreeMap<u8, u8>,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub sides: SideRule,
    pub dispatch_hat: bool,
    pub midi: MidiSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceSettings::default(),
            layout: ReportLayout::default(),
            turntable_timeout_ms: 200,
            pins: PinMap::default().to_raw(),
            sides: SideRule::default(),
            dispatch_hat: false,
            midi: MidiSettings::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no configuration file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pin_map()?;
        self.midi.validate()?;

        let needed = self.layout.min_len();
        if needed > MAX_REPORT_LEN {
            return Err(ConfigError::LayoutTooLong(needed));
        }
        if self.turntable_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn pin_map(&self) -> Result<PinMap, ConfigError> {
        PinMap::from_pairs(self.pins.iter().map(|(&button, &pin)| (button, pin)))
    }

    pub fn turntable_timeout(&self) -> Duration {
        Duration::from_millis(self.turntable_timeout_ms)
    }

    /// Parser for one device on `side`, configured from this file.
    ///
    /// `pins` is the validated table from [`Config::pin_map`].
    pub fn parser<H: JoystickEvents>(
        &self,
        side: Side,
        pins: PinMap,
        events: H,
    ) -> JoystickParser<H> {
        JoystickParser::new(side, pins, events)
            .with_layout(self.layout)
            .with_turntable_timeout(self.turntable_timeout())
            .with_hat_dispatch(self.dispatch_hat)
    }
}
