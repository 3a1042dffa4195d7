use std::collections::HashSet;
use std::path::Path;

use mrot_core::Response;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub characters: Vec<char>,
    pub angles: Vec<u16>,
    pub practice_trials: usize,
    pub formal_trials: usize,
    pub timing: TrialDurations,
    pub keys: KeyMap,
    /// Lower bound applied to every reaction time.
    pub rt_floor_ms: u64,
    /// Hold at a break screen between practice and formal blocks until the
    /// participant confirms.
    pub confirm_between_blocks: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            characters: vec!['R', 'J', 'G', '2', '5', '7'],
            angles: vec![0, 60, 120, 180, 240, 300],
            practice_trials: 12,
            formal_trials: 72,
            timing: TrialDurations::default(),
            keys: KeyMap::default(),
            rt_floor_ms: 50,
            confirm_between_blocks: true,
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.characters.is_empty() {
            return Err(ConfigError::NoCharacters);
        }
        if self.angles.is_empty() {
            return Err(ConfigError::NoAngles);
        }

        let mut seen = HashSet::new();
        for &c in &self.characters {
            if !seen.insert(c) {
                return Err(ConfigError::DuplicateCharacter(c));
            }
        }
        let mut seen = HashSet::new();
        for &a in &self.angles {
            if a >= 360 {
                return Err(ConfigError::AngleOutOfRange(a));
            }
            if !seen.insert(a) {
                return Err(ConfigError::DuplicateAngle(a));
            }
        }

        self.keys.validate()?;
        self.timing.validate()
    }

    pub fn block_len(&self, practice: bool) -> usize {
        if practice {
            self.practice_trials
        } else {
            self.formal_trials
        }
    }
}

/// Fixed phase durations of a single trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialDurations {
    pub fixation_ms: u64,
    pub response_timeout_ms: u64,
    pub feedback_ms: u64,
}

impl Default for TrialDurations {
    fn default() -> Self {
        Self {
            fixation_ms: 500,
            response_timeout_ms: 3000,
            feedback_ms: 500,
        }
    }
}

impl TrialDurations {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.response_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("response timeout"));
        }
        if self.feedback_ms == 0 {
            return Err(ConfigError::ZeroDuration("feedback"));
        }
        Ok(())
    }
}

/// Raw key identifiers for the two valid responses. Matching is
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyMap {
    pub normal: String,
    pub mirrored: String,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self {
            normal: "f".into(),
            mirrored: "j".into(),
        }
    }
}

impl KeyMap {
    pub fn resolve(&self, raw_key: &str) -> Option<Response> {
        let key = raw_key.to_lowercase();
        if key == self.normal.to_lowercase() {
            Some(Response::Normal)
        } else if key == self.mirrored.to_lowercase() {
            Some(Response::Mirrored)
        } else {
            None
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let normal = self.normal.to_lowercase();
        let mirrored = self.mirrored.to_lowercase();
        if normal.is_empty() || mirrored.is_empty() || normal == mirrored {
            return Err(ConfigError::InvalidKeys {
                normal: self.normal.clone(),
                mirrored: self.mirrored.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ExperimentConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ExperimentConfig::from_json_str(
            r#"{ "practice_trials": 4, "timing": { "response_timeout_ms": 2000 } }"#,
        )
        .unwrap();
        assert_eq!(config.practice_trials, 4);
        assert_eq!(config.formal_trials, 72);
        assert_eq!(config.timing.response_timeout_ms, 2000);
        assert_eq!(config.timing.fixation_ms, 500);
        assert_eq!(config.keys, KeyMap::default());
    }

    #[test]
    fn rejects_bad_configs() {
        let mut config = ExperimentConfig::default();
        config.angles.push(60);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateAngle(60))
        ));

        let mut config = ExperimentConfig::default();
        config.keys.mirrored = "F".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidKeys { .. })
        ));

        let mut config = ExperimentConfig::default();
        config.characters.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoCharacters)));

        let mut config = ExperimentConfig::default();
        config.timing.response_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDuration(_))
        ));

        assert!(matches!(
            ExperimentConfig::from_json_str(r#"{ "angles": [400] }"#),
            Err(ConfigError::AngleOutOfRange(400))
        ));
        assert!(matches!(
            ExperimentConfig::from_json_str("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn keys_match_case_insensitively() {
        let keys = KeyMap::default();
        assert_eq!(keys.resolve("F"), Some(Response::Normal));
        assert_eq!(keys.resolve("j"), Some(Response::Mirrored));
        assert_eq!(keys.resolve("k"), None);
        assert_eq!(keys.resolve(""), None);
    }
}
