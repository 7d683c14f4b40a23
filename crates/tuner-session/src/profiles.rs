//! Frequency profile index
//!
//! Maps a transceiver frequency to the tuning state stored for its band
//! segment. Entries keep insertion order; lookup returns the first entry
//! whose inclusive range contains the frequency, so earlier entries win
//! where ranges overlap.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tuner_protocol::{Hertz, TuningState, L_MAX};

use crate::error::SessionError;

/// One stored band segment and its tuning state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyProfile {
    /// Lower edge in Hz, inclusive
    #[serde(deserialize_with = "hertz")]
    pub min_freq: Hertz,
    /// Upper edge in Hz, inclusive
    #[serde(deserialize_with = "hertz")]
    pub max_freq: Hertz,
    /// L-bank value
    #[serde(rename = "L")]
    pub l: u8,
    /// C-bank value
    #[serde(rename = "C")]
    pub c: u8,
    /// Filter path
    pub highpass: bool,
}

impl FrequencyProfile {
    /// Create an entry, rejecting an inverted range or an L value above 127
    pub fn new(
        min_freq: Hertz,
        max_freq: Hertz,
        l: u8,
        c: u8,
        highpass: bool,
    ) -> Result<Self, SessionError> {
        let entry = Self {
            min_freq,
            max_freq,
            l,
            c,
            highpass,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Check the range and relay values
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.min_freq > self.max_freq {
            return Err(SessionError::InvalidProfile(format!(
                "min_freq {} is above max_freq {}",
                self.min_freq, self.max_freq
            )));
        }
        if !self.state().is_valid() {
            return Err(SessionError::InvalidProfile(format!(
                "L={} exceeds {}",
                self.l, L_MAX
            )));
        }
        Ok(())
    }

    /// Returns true if `freq` lies within the inclusive range
    pub fn contains(&self, freq: Hertz) -> bool {
        self.min_freq <= freq && freq <= self.max_freq
    }

    /// Tuning state stored for this segment
    pub fn state(&self) -> TuningState {
        TuningState::new(self.l, self.c, self.highpass)
    }
}

impl fmt::Display for FrequencyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{} Hz: L={}, C={}, HP={}",
            self.min_freq, self.max_freq, self.l, self.c, self.highpass
        )
    }
}

/// Accept frequencies written as integers or as whole-valued floats
fn hertz<'de, D>(deserializer: D) -> Result<Hertz, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(u64),
        Float(f64),
    }

    match Number::deserialize(deserializer)? {
        Number::Int(n) => Ok(n),
        Number::Float(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        Number::Float(f) => Err(serde::de::Error::custom(format!(
            "frequency {f} is not a whole number of Hz"
        ))),
    }
}

/// Ordered collection of profile entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileIndex {
    entries: Vec<FrequencyProfile>,
}

impl ProfileIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index from entries in their stored order
    pub fn from_entries(entries: Vec<FrequencyProfile>) -> Self {
        Self { entries }
    }

    /// First entry whose range contains `freq`
    pub fn lookup(&self, freq: Hertz) -> Option<&FrequencyProfile> {
        self.lookup_index(freq).map(|(_, entry)| entry)
    }

    /// First entry whose range contains `freq`, with its position
    pub fn lookup_index(&self, freq: Hertz) -> Option<(usize, &FrequencyProfile)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.contains(freq))
    }

    /// Append an entry after all existing ones
    pub fn add_entry(&mut self, entry: FrequencyProfile) {
        self.entries.push(entry);
    }

    /// Remove the entry at `index`, keeping the order of the rest
    pub fn delete_entry(&mut self, index: usize) -> Result<FrequencyProfile, SessionError> {
        if index >= self.entries.len() {
            return Err(SessionError::ProfileNotFound {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    /// Iterate entries in stored order
    pub fn iter(&self) -> impl Iterator<Item = &FrequencyProfile> {
        self.entries.iter()
    }

    /// Entries in stored order
    pub fn entries(&self) -> &[FrequencyProfile] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Persistent storage for profile entries
pub trait ProfileStore {
    /// All entries in stored order
    fn all_entries(&self) -> &[FrequencyProfile];

    /// Append an entry
    fn append(&mut self, entry: FrequencyProfile) -> Result<(), SessionError>;

    /// Remove the entry at `index`
    fn remove(&mut self, index: usize) -> Result<FrequencyProfile, SessionError>;

    /// Write the current contents to the backing storage
    fn persist(&self) -> Result<(), SessionError>;

    /// Replace the current contents with those read from `path`
    fn load(&mut self, path: &Path) -> Result<(), SessionError>;

    /// Snapshot of the entries as a lookup index
    fn index(&self) -> ProfileIndex {
        ProfileIndex::from_entries(self.all_entries().to_vec())
    }
}
