//! Best score persistence.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("save file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("save file is corrupt: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("could not encode save data: {0}")]
    Encode(#[from] ron::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveData {
    pub best_score: u32,
}

impl SaveData {
    /// A missing save file means a fresh player.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SaveError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(ron::from_str(&contents)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn store<P: AsRef<Path>>(&self, path: P) -> Result<(), SaveError> {
        let contents = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_save_is_zero() {
        let data = SaveData::load("no/such/save.ron").unwrap();
        assert_eq!(data.best_score, 0);
    }

    #[test]
    fn stored_score_is_read_back() {
        let path = std::env::temp_dir().join(format!("pixel_runner_save_{}.ron", std::process::id()));
        SaveData { best_score: 412 }.store(&path).unwrap();

        let data = SaveData::load(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(data.best_score, 412);
    }

    #[test]
    fn corrupt_save_is_reported() {
        let path = std::env::temp_dir().join(format!("pixel_runner_corrupt_{}.ron", std::process::id()));
        fs::write(&path, "best_score = lots").unwrap();

        let result = SaveData::load(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(SaveError::Parse(_))));
    }
}
