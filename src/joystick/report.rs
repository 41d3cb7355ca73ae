use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("invalid report length: expected at least {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Byte offsets of the fields the decoder reads from an input report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportLayout {
    pub buttons_low: usize,
    pub buttons_high: usize,
    pub turntable: usize,
    /// Auxiliary byte handed to turntable events as-is.
    pub payload: usize,
    pub hat: Option<usize>,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            buttons_low: 2,
            buttons_high: 3,
            turntable: 6,
            payload: 6,
            hat: None,
        }
    }
}

impl ReportLayout {
    /// Shortest report this layout can be read from.
    pub fn min_len(&self) -> usize {
        let last = [
            self.buttons_low,
            self.buttons_high,
            self.turntable,
            self.payload,
            self.hat.unwrap_or(0),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        last.saturating_add(1)
    }

    /// Parse a raw report into its decoded fields.
    pub fn parse(&self, buf: &[u8]) -> Result<ReportSnapshot, ReportError> {
        let expected = self.min_len();
        if buf.len() < expected {
            return Err(ReportError::InvalidLength {
                expected,
                actual: buf.len(),
            });
        }

        Ok(ReportSnapshot {
            buttons: u16::from_le_bytes([buf[self.buttons_low], buf[self.buttons_high]]),
            turntable: buf[self.turntable],
            payload: buf[self.payload],
            hat: self.hat.map(|idx| buf[idx]),
        })
    }
}

/// Decoded fields of one input report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSnapshot {
    pub buttons: u16,
    pub turntable: u8,
    pub payload: u8,
    pub hat: Option<u8>,
}

/// What changed between the stored state and a new report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportDiff {
    /// Button bits that flipped.
    pub changed: u16,
    /// Turntable movement, wrapped into `-128..=127`.
    pub delta: i8,
    pub turntable_moved: bool,
}

impl ReportDiff {
    /// Compare a report against the previous button mask and turntable byte.
    ///
    /// `None` for the previous turntable byte never equals a real byte, so the
    /// first report always counts as movement; its delta is taken against 0.
    pub fn between(
        previous_buttons: u16,
        previous_turntable: Option<u8>,
        report: &ReportSnapshot,
    ) -> Self {
        let delta = report
            .turntable
            .wrapping_sub(previous_turntable.unwrap_or(0)) as i8;
        Self {
            changed: previous_buttons ^ report.buttons,
            delta,
            turntable_moved: previous_turntable != Some(report.turntable),
        }
    }

    /// Bit positions (0-origin) of flipped buttons, ascending.
    pub fn changed_bits(&self) -> impl Iterator<Item = u8> {
        let changed = self.changed;
        (0..16u8).filter(move |bit| changed & (1 << bit) != 0)
    }
}
