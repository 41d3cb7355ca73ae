use std::{collections::BTreeMap, fmt};

use crate::config::ConfigError;

/// Number of buttons carried by the 16-bit button mask.
pub const BUTTON_COUNT: u8 = 16;

/// Highest pin whose packed state bit stays below the turntable direction bits.
pub const MAX_PIN: u8 = 13;

/// Logical button index, 1-origin (`1..=16`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ButtonId(u8);

impl ButtonId {
    pub fn new(id: u8) -> Option<Self> {
        (1..=BUTTON_COUNT).contains(&id).then_some(Self(id))
    }

    /// Button id for bit `bit` (0-origin) of the button mask.
    pub(crate) fn from_bit(bit: u8) -> Option<Self> {
        Self::new(bit.checked_add(1)?)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub(crate) fn mask(self) -> u16 {
        1 << (self.0 - 1)
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical output pin (`1..=13`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PinId(u8);

impl PinId {
    pub fn new(pin: u8) -> Option<Self> {
        (1..=MAX_PIN).contains(&pin).then_some(Self(pin))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Bit of the aggregate state word that mirrors this pin.
    ///
    /// The packing is `pin / 8 + (pin - 1)`: pins 1..=7 land on bits 0..=6,
    /// pins 8..=13 on bits 8..=13, and bit 7 is never used. Output consumers
    /// decode the state word with the same formula, so it must not change.
    pub fn state_bit(self) -> u8 {
        self.0 / 8 + (self.0 - 1)
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lookup from logical button to physical pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinMap {
    slots: [Option<PinId>; BUTTON_COUNT as usize],
}

impl PinMap {
    /// A table with every button unassigned.
    pub fn empty() -> Self {
        Self {
            slots: [None; BUTTON_COUNT as usize],
        }
    }

    /// Build a table from raw `(button, pin)` pairs, rejecting ids out of range.
    ///
    /// A pin of 0 leaves the button unassigned.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (u8, u8)>,
    {
        let mut map = Self::empty();
        for (button, pin) in pairs {
            let button = ButtonId::new(button).ok_or(ConfigError::InvalidButton(button))?;
            let pin = match pin {
                0 => None,
                pin => Some(PinId::new(pin).ok_or(ConfigError::InvalidPin { button, pin })?),
            };
            map.slots[usize::from(button.get() - 1)] = pin;
        }
        Ok(map)
    }

    pub fn pin(&self, button: ButtonId) -> Option<PinId> {
        self.slots[usize::from(button.get() - 1)]
    }

    /// Assigned `(button, pin)` pairs in ascending button order.
    pub fn iter(&self) -> impl Iterator<Item = (ButtonId, PinId)> + '_ {
        self.slots.iter().enumerate().filter_map(|(idx, pin)| {
            let button = ButtonId::from_bit(idx as u8)?;
            pin.map(|pin| (button, pin))
        })
    }

    pub fn to_raw(&self) -> BTreeMap<u8, u8> {
        self.iter().map(|(b, p)| (b.get(), p.get())).collect()
    }
}

impl Default for PinMap {
    fn default() -> Self {
        const DEFAULT_PINS: [(u8, u8); 9] = [
            (1, 8),
            (4, 9),
            (8, 7),
            (9, 6),
            (11, 2),
            (12, 4),
            (14, 5),
            (15, 3),
            (16, 1),
        ];
        let mut map = Self::empty();
        for (button, pin) in DEFAULT_PINS {
            map.slots[usize::from(button - 1)] = Some(PinId(pin));
        }
        map
    }
}
