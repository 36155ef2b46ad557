// src/config.rs
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::geometry::DEFAULT_ALPHA;
use crate::tracking::EngineOptions;
use crate::validators::{ValidatorConfig, DEFAULT_DEBOUNCE_FRAMES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachSettings {
    #[serde(default = "default_smoothing_alpha")]
    pub smoothing_alpha: f64,
    #[serde(default = "default_debounce_frames")]
    pub debounce_frames: u32,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_smoothing_alpha() -> f64 { DEFAULT_ALPHA }
fn default_debounce_frames() -> u32 { DEFAULT_DEBOUNCE_FRAMES }
fn default_broadcast_capacity() -> usize { 64 }

fn default_output_directory() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|p| p.join("FormCoach")))
        .unwrap_or_else(|| PathBuf::from("./output"))
}

fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("com", "formcoach", "FormCoach")
        .map(|dirs| dirs.data_dir().join("thresholds.json"))
        .unwrap_or_else(|| PathBuf::from("./form_coach_store.json"))
}

impl Default for CoachSettings {
    fn default() -> Self {
        Self {
            smoothing_alpha: default_smoothing_alpha(),
            debounce_frames: default_debounce_frames(),
            broadcast_capacity: default_broadcast_capacity(),
            muted: false,
            output_directory: default_output_directory(),
            store_path: default_store_path(),
        }
    }
}

impl CoachSettings {
    /// Reads settings from a JSON file. A missing file gives the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            smoothing_alpha: self.smoothing_alpha,
            broadcast_capacity: self.broadcast_capacity,
        }
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            debounce_frames: self.debounce_frames,
            ..ValidatorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("form_coach_missing_{}.json", uuid::Uuid::new_v4()));
        assert_eq!(CoachSettings::load(&path).unwrap(), CoachSettings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = std::env::temp_dir().join(format!("form_coach_cfg_{}", uuid::Uuid::new_v4()));
        let path = dir.join("settings.json");
        fs::create_dir_all(&dir).unwrap();
        fs::write(&path, r#"{ "debounce_frames": 5, "muted": true }"#).unwrap();

        let settings = CoachSettings::load(&path).unwrap();
        assert_eq!(settings.debounce_frames, 5);
        assert!(settings.muted);
        assert_eq!(settings.smoothing_alpha, 0.5);
        assert_eq!(settings.validator_config().debounce_frames, 5);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("form_coach_cfg_{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("settings.json");
        let settings = CoachSettings {
            smoothing_alpha: 0.3,
            output_directory: PathBuf::from("/tmp/out"),
            ..CoachSettings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(CoachSettings::load(&path).unwrap(), settings);
        assert_eq!(settings.engine_options().smoothing_alpha, 0.3);
        let _ = fs::remove_dir_all(&dir);
    }
}
