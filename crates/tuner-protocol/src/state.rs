//! Tuning state value type

use std::fmt;

/// Frequency in Hertz
pub type Hertz = u64;

/// Largest valid L-bank value (7 relays)
pub const L_MAX: u8 = 127;

/// Largest valid C-bank value (8 relays)
pub const C_MAX: u8 = 255;

/// Complete configuration of the matching network
///
/// Equality is structural: two states are equal when all three fields are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TuningState {
    /// L-bank relay bitmask, 0..=127
    pub l: u8,
    /// C-bank relay bitmask, 0..=255
    pub c: u8,
    /// true = high-pass path, false = low-pass path
    pub highpass: bool,
}

impl TuningState {
    /// Create a new tuning state
    ///
    /// `l` must not exceed [`L_MAX`]. The value is not checked here; use
    /// [`TuningState::is_valid`] at the point where operator input enters.
    pub const fn new(l: u8, c: u8, highpass: bool) -> Self {
        Self { l, c, highpass }
    }

    /// Returns whether every field is within the range the hardware supports
    pub fn is_valid(&self) -> bool {
        self.l <= L_MAX
    }

    /// Name of the selected filter path
    pub fn filter_name(&self) -> &'static str {
        if self.highpass {
            "high-pass"
        } else {
            "low-pass"
        }
    }
}

impl fmt::Display for TuningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L={}, C={}, HP={}", self.l, self.c, self.highpass)
    }
}
