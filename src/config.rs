use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

pub const CONFIG_PATH: &str = "assets/config.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

pub const DEFAULT_FONT: &str = "fonts/pixel_runner.ttf";

/// Named sound clips, as asset paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    pub sfx: BTreeMap<String, String>,
    pub music: BTreeMap<String, String>,
}

impl Default for SoundConfig {
    fn default() -> Self {
        let clips = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(name, path)| (name.to_string(), path.to_string()))
                .collect()
        };
        Self {
            sfx: clips(&[("Death", "sounds/death.wav"), ("Select", "sounds/select.wav")]),
            music: clips(&[("Intro", "music/intro.wav"), ("GameLoop", "music/game_loop.wav")]),
        }
    }
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub window_title: String,
    /// World units visible from the bottom to the top of the screen.
    pub view_height: f32,
    /// How fast the world scrolls past. Changing it changes how far a jump
    /// carries, so the layout may need retuning.
    pub world_scroll_speed: f32,
    pub gravity: f32,
    pub jump_height: f32,
    /// Seconds the jump input stays held after a tap.
    pub jump_hold: f32,
    pub player_start: [f32; 2],
    pub player_size: f32,
    /// Spikes stop killing the player. Walls and falls still do.
    pub invincible: bool,
    pub noise_seed: f32,
    pub debug_render: bool,
    pub layout_path: String,
    pub save_path: String,
    pub font: Option<String>,
    pub sounds: SoundConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            window_title: String::from("Pixel Runner"),
            view_height: 10.0,
            world_scroll_speed: 8.0,
            gravity: 40.0,
            jump_height: 3.2,
            jump_hold: 0.18,
            player_start: [-4.0, -1.0],
            player_size: 0.8,
            invincible: false,
            noise_seed: 23.0,
            debug_render: false,
            layout_path: String::from("assets/scenery.ron"),
            save_path: String::from("pixel_runner_save.ron"),
            font: Some(String::from(DEFAULT_FONT)),
            sounds: SoundConfig::default(),
        }
    }
}

impl GameConfig {
    /// Reads the config file. A missing file is not an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_ron_str(&contents),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(s)?)
    }

    pub fn player_start(&self) -> Vec3 {
        Vec3::new(self.player_start[0], self.player_start[1], 0.0)
    }
}
