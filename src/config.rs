use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Slowdown factors below this are clamped.
pub const MIN_SLOWDOWN: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub frames_per_sec: u32,
    /// Playback speed divisor: 2.0 plays at half speed.
    pub slowdown: f64,
    /// Lowest key on the player's keyboard. Held together with `highest_note` it ends the song.
    pub lowest_note: u8,
    pub highest_note: u8,
    pub ticks_shown: u64,
    pub input_capacity: usize,
    /// Substring of the MIDI input port name to connect to. The first port is used otherwise.
    pub midi_port: Option<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            frames_per_sec: 15,
            slowdown: 1.0,
            lowest_note: 36,
            highest_note: 96,
            ticks_shown: 300,
            input_capacity: 256,
            midi_port: None,
        }
    }
}

impl PlayerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "config not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(Error::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config: PlayerConfig = ron::from_str(&text)?;
        info!(path = %path.display(), "loaded config");
        Ok(config.normalized())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, text).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn normalized(mut self) -> Self {
        if !(self.slowdown >= MIN_SLOWDOWN) {
            warn!(slowdown = self.slowdown, "slowdown too small, clamping");
            self.slowdown = MIN_SLOWDOWN;
        }
        if self.frames_per_sec == 0 {
            self.frames_per_sec = 1;
        }
        if self.lowest_note > self.highest_note {
            std::mem::swap(&mut self.lowest_note, &mut self.highest_note);
        }
        self
    }
}
