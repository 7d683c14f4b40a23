//! Application settings

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tuner_session::{
    DeviceEndpoint, FrequencyProfile, ProfileStore, SessionError, DEFAULT_CAT_ADDR, DEFAULT_HOST,
    DEFAULT_PORT,
};

/// Persisted settings: profile entries plus tuner and transceiver addresses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Frequency profile entries in lookup order
    #[serde(default)]
    pub frequencies: Vec<FrequencyProfile>,
    /// Tuner controller address
    #[serde(default = "default_sbc_ip")]
    pub sbc_ip: String,
    /// Tuner controller UDP port
    #[serde(default = "default_sbc_port")]
    pub sbc_port: u16,
    /// Transceiver model identifier, if one was chosen
    #[serde(default)]
    pub trx_id: Option<i64>,
    /// Transceiver CAT address
    #[serde(default = "default_trx_port")]
    pub trx_port: String,
    /// File these settings are saved to
    #[serde(skip)]
    path: PathBuf,
}

fn default_sbc_ip() -> String {
    DEFAULT_HOST.to_string()
}

fn default_sbc_port() -> u16 {
    DEFAULT_PORT
}

fn default_trx_port() -> String {
    DEFAULT_CAT_ADDR.to_string()
}

impl Settings {
    /// Defaults that will be saved to `path`
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            frequencies: Vec::new(),
            sbc_ip: default_sbc_ip(),
            sbc_port: default_sbc_port(),
            trx_id: None,
            trx_port: default_trx_port(),
            path: path.into(),
        }
    }

    /// Get the XDG config directory for ck-netctrl
    /// Uses $XDG_CONFIG_HOME/ck-netctrl, falls back to ~/.config/ck-netctrl
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("ck-netctrl"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("ck-netctrl"))
    }

    /// Default settings file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from `path`; a missing file yields defaults
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let mut settings = Self::with_path(path);
        let path = settings.path.clone();
        settings.load(&path)?;
        Ok(settings)
    }

    /// File these settings are saved to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tuner endpoint from `sbc_ip`/`sbc_port`
    pub fn endpoint(&self) -> Result<DeviceEndpoint, SessionError> {
        DeviceEndpoint::new(self.sbc_ip.clone(), self.sbc_port)
    }

    fn read(path: &Path) -> Result<Option<Self>, SessionError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let parsed: Self = serde_json::from_str(&text)
            .map_err(|e| SessionError::Store(format!("{}: {}", path.display(), e)))?;
        for entry in &parsed.frequencies {
            entry
                .validate()
                .map_err(|e| SessionError::Store(format!("{}: {}", path.display(), e)))?;
        }
        Ok(Some(parsed))
    }
}

impl ProfileStore for Settings {
    fn all_entries(&self) -> &[FrequencyProfile] {
        &self.frequencies
    }

    fn append(&mut self, entry: FrequencyProfile) -> Result<(), SessionError> {
        entry.validate()?;
        self.frequencies.push(entry);
        Ok(())
    }

    fn remove(&mut self, index: usize) -> Result<FrequencyProfile, SessionError> {
        if index >= self.frequencies.len() {
            return Err(SessionError::ProfileNotFound {
                index,
                len: self.frequencies.len(),
            });
        }
        Ok(self.frequencies.remove(index))
    }

    fn persist(&self) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SessionError::Store(format!("failed to serialize settings: {}", e)))?;
        std::fs::write(&self.path, json)?;

        info!("Saved settings to {}", self.path.display());
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<(), SessionError> {
        match Self::read(path)? {
            Some(loaded) => {
                debug!(
                    "Loaded {} profiles from {}",
                    loaded.frequencies.len(),
                    path.display()
                );
                let own_path = std::mem::take(&mut self.path);
                *self = Self {
                    path: own_path,
                    ..loaded
                };
            }
            None => {
                debug!("No settings at {}, using defaults", path.display());
                let own_path = std::mem::take(&mut self.path);
                *self = Self::with_path(own_path);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ck-netctrl-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = scratch_dir("missing");
        let settings = Settings::load_from(dir.join("settings.json")).unwrap();
        assert!(settings.frequencies.is_empty());
        assert_eq!(settings.sbc_ip, "10.1.0.1");
        assert_eq!(settings.sbc_port, 54123);
        assert_eq!(settings.trx_id, None);
        assert_eq!(settings.trx_port, "localhost:19090");
        assert_eq!(settings.endpoint().unwrap(), DeviceEndpoint::default());
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = scratch_dir("persist");
        let path = dir.join("nested").join("settings.json");

        let mut settings = Settings::with_path(&path);
        settings
            .append(FrequencyProfile::new(3_500_000, 3_800_000, 10, 20, false).unwrap())
            .unwrap();
        settings
            .append(FrequencyProfile::new(7_000_000, 7_200_000, 30, 40, true).unwrap())
            .unwrap();
        settings.sbc_ip = "192.168.1.50".to_string();
        settings.persist().unwrap();

        let reloaded = Settings::load_from(&path).unwrap();
        assert_eq!(reloaded, settings);
        assert_eq!(reloaded.index().lookup(7_100_000).map(|e| e.l), Some(30));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_reads_document_with_float_frequencies() {
        let dir = scratch_dir("float");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        std::fs::write(
            &path,
            r#"{
  "frequencies": [
    {"min_freq": 3500000.0, "max_freq": 3600000.0, "L": 5, "C": 6, "highpass": false}
  ],
  "sbc_ip": "10.1.0.9",
  "sbc_port": 54123,
  "trx_id": 2048,
  "trx_port": "localhost:19090"
}"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.frequencies.len(), 1);
        assert_eq!(settings.frequencies[0].max_freq, 3_600_000);
        assert_eq!(settings.trx_id, Some(2048));
        assert_eq!(settings.sbc_ip, "10.1.0.9");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_import_keeps_own_path() {
        let dir = scratch_dir("import");
        let other = dir.join("other.json");
        let mut source = Settings::with_path(&other);
        source
            .append(FrequencyProfile::new(1, 2, 3, 4, true).unwrap())
            .unwrap();
        source.persist().unwrap();

        let own = dir.join("settings.json");
        let mut settings = Settings::with_path(&own);
        settings.load(&other).unwrap();
        assert_eq!(settings.path(), own.as_path());
        assert_eq!(settings.frequencies.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rejects_invalid_entries() {
        let dir = scratch_dir("invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        std::fs::write(
            &path,
            r#"{"frequencies": [{"min_freq": 10, "max_freq": 5, "L": 1, "C": 1, "highpass": false}]}"#,
        )
        .unwrap();

        assert!(matches!(
            Settings::load_from(&path),
            Err(SessionError::Store(_))
        ));

        let mut settings = Settings::with_path(dir.join("x.json"));
        assert!(settings.remove(0).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
