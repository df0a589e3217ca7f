use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::composite::CanvasBounds;
use crate::palette::Palette;
use crate::timeline::PacingPolicy;
use crate::{PlayerError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Grid columns.
    pub width: u32,
    /// Grid rows.
    pub height: u32,
    pub palette: Palette,
    /// Scale applied to every authored delay; the product is in milliseconds.
    pub frame_delay_multiplier: f64,
    /// Delay before the soundtrack starts, measured from process start.
    pub audio_start_offset_ms: u64,
    /// Pause after the last frame before the display is released.
    pub hold_after_end_ms: u64,
    pub audio: AudioConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            width: 160,
            height: 60,
            palette: Palette::default(),
            frame_delay_multiplier: 10.0,
            audio_start_offset_ms: 250,
            hold_after_end_ms: 3000,
            audio: AudioConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads a JSON config file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|err| PlayerError::resource(path, err))?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings no animation could play with.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PlayerError::InvalidConfig(format!(
                "grid dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.frame_delay_multiplier.is_finite() || self.frame_delay_multiplier <= 0.0 {
            return Err(PlayerError::InvalidConfig(format!(
                "frame delay multiplier must be a positive number, got {}",
                self.frame_delay_multiplier
            )));
        }
        if self.palette.is_empty() {
            return Err(PlayerError::InvalidConfig(
                "palette must contain at least one entry".to_string(),
            ));
        }
        Ok(())
    }

    /// Every grid cell must cover at least one canvas pixel.
    pub fn validate_for_canvas(&self, bounds: CanvasBounds) -> Result<()> {
        if self.width > bounds.width || self.height > bounds.height {
            return Err(PlayerError::InvalidConfig(format!(
                "grid {}x{} is larger than the {}x{} animation",
                self.width, self.height, bounds.width, bounds.height
            )));
        }
        Ok(())
    }

    /// Pacing for the configured delay multiplier.
    pub fn pacing(&self) -> PacingPolicy {
        PacingPolicy::millis(self.frame_delay_multiplier)
    }

    /// Offset from process start to soundtrack start.
    pub fn audio_start_offset(&self) -> Duration {
        Duration::from_millis(self.audio_start_offset_ms)
    }

    /// How long the last frame stays up after playback.
    pub fn hold_after_end(&self) -> Duration {
        Duration::from_millis(self.hold_after_end_ms)
    }
}

/// External soundtrack player invocation; the track path is appended last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Program that plays the track.
    pub command: String,
    pub args: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            command: "ffplay".to_string(),
            args: ["-nodisp", "-autoexit", "-loglevel", "quiet"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::{ColorId, Rgb};
    use std::io::Write;

    #[test]
    fn defaults_match_console_player() {
        let config = AppConfig::default();
        assert_eq!((config.width, config.height), (160, 60));
        assert_eq!(config.palette.len(), 2);
        assert_eq!(config.palette.entries()[0].rgb, Rgb(12, 12, 12));
        assert_eq!(config.palette.entries()[1].id, ColorId::White);
        assert_eq!(config.pacing().wait_for(4), Duration::from_millis(40));
        assert_eq!(config.audio_start_offset(), Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"width": 80, "palette": [{{"rgb": [0, 0, 255], "id": "blue"}}]}}"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.width, 80);
        assert_eq!(config.height, 60);
        assert_eq!(config.palette.nearest(Rgb(10, 10, 10)), ColorId::Blue);
        assert_eq!(config.audio.command, "ffplay");
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = AppConfig::default();
        config.height = 0;
        assert!(matches!(config.validate(), Err(PlayerError::InvalidConfig(_))));

        let mut config = AppConfig::default();
        config.frame_delay_multiplier = -1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.frame_delay_multiplier = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_palette_in_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"palette": []}}"#).unwrap();
        assert!(matches!(
            AppConfig::load(file.path()),
            Err(PlayerError::Json(_))
        ));
    }

    #[test]
    fn missing_file_is_a_resource_error() {
        let err = AppConfig::load(Path::new("/nonexistent/palette-player.json")).unwrap_err();
        assert!(matches!(err, PlayerError::Resource { .. }));
    }

    #[test]
    fn grid_must_fit_inside_canvas() {
        let config = AppConfig::default();
        let small = CanvasBounds {
            width: 100,
            height: 100,
        };
        let large = CanvasBounds {
            width: 480,
            height: 360,
        };
        assert!(config.validate_for_canvas(small).is_err());
        assert!(config.validate_for_canvas(large).is_ok());
    }
}
