use std::fmt;

use serde::{Deserialize, Serialize};

/// Which of the two controllers a device instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("L"),
            Side::Right => f.write_str("R"),
        }
    }
}

/// Classifies a USB device address as left or right.
///
/// In YAML the explicit form is written as a single-key map, read through
/// `serde_yaml::with::singleton_map`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideRule {
    /// Even addresses are right, odd addresses are left.
    #[default]
    Parity,
    /// Fixed address lists; anything unlisted gets `fallback`.
    Explicit {
        #[serde(default)]
        left: Vec<u8>,
        #[serde(default)]
        right: Vec<u8>,
        #[serde(default = "default_fallback")]
        fallback: Side,
    },
}

fn default_fallback() -> Side {
    Side::Left
}

impl SideRule {
    pub fn classify(&self, address: u8) -> Side {
        match self {
            SideRule::Parity if address % 2 == 0 => Side::Right,
            SideRule::Parity => Side::Left,
            SideRule::Explicit {
                left,
                right,
                fallback,
            } => {
                if left.contains(&address) {
                    Side::Left
                } else if right.contains(&address) {
                    Side::Right
                } else {
                    *fallback
                }
            }
        }
    }
}
