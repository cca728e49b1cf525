use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PictError, Result};

/// All tunables in one place. Values come from the environment with
/// sensible defaults; only the data directory is mandatory.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory owned by the cache layer: scaled renditions, grabbed
    /// movie frames and per-book property files all live under it.
    pub data_dir: PathBuf,

    // Thumbnail size policy
    pub default_thumbnail_size: u32,
    pub min_thumbnail_size: u32,
    pub max_thumbnail_size: u32,

    /// Fill transparency of the "play" glyph drawn on movie thumbnails,
    /// 0.0 (invisible) to 1.0 (opaque).
    pub movie_overlay_alpha: f32,

    // Frame-scan heuristics. Empirically tuned, not load-bearing.
    /// Stream seconds to skip after a boring frame before scoring again.
    pub boring_skip_secs: f64,
    /// Stream-time mark at which the scan gives up and keeps the most
    /// recent candidate.
    pub scan_cutoff_secs: f64,
    /// Wall-clock ceiling for one frame grab.
    pub grab_wall_clock_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let data_dir = env::var("PICTBOOK_DATA_DIR")
            .map(PathBuf::from)
            .map_err(|_| {
                PictError::Config("PICTBOOK_DATA_DIR is not set".to_string())
            })?;

        let config = Self {
            data_dir,
            default_thumbnail_size: env_or("PICTBOOK_THUMB_SIZE", 150),
            min_thumbnail_size: env_or("PICTBOOK_THUMB_MIN", 32),
            max_thumbnail_size: env_or("PICTBOOK_THUMB_MAX", 640),
            movie_overlay_alpha: env_or("PICTBOOK_OVERLAY_ALPHA", 0.5),
            boring_skip_secs: env_or("PICTBOOK_BORING_SKIP_SECS", 1.0),
            scan_cutoff_secs: env_or("PICTBOOK_SCAN_CUTOFF_SECS", 10.0),
            grab_wall_clock_secs: env_or("PICTBOOK_GRAB_TIMEOUT_SECS", 5),
        };
        config.validate()?;
        Ok(config)
    }

    /// A configuration rooted at the given data dir with every default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            default_thumbnail_size: 150,
            min_thumbnail_size: 32,
            max_thumbnail_size: 640,
            movie_overlay_alpha: 0.5,
            boring_skip_secs: 1.0,
            scan_cutoff_secs: 10.0,
            grab_wall_clock_secs: 5,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.min_thumbnail_size == 0
            || self.min_thumbnail_size > self.max_thumbnail_size
        {
            return Err(PictError::Config(format!(
                "bad thumbnail size range [{}, {}]",
                self.min_thumbnail_size, self.max_thumbnail_size
            )));
        }
        if !(0.0..=1.0).contains(&self.movie_overlay_alpha) {
            return Err(PictError::Config(format!(
                "overlay alpha {} outside [0, 1]",
                self.movie_overlay_alpha
            )));
        }
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    /// Clamp a requested thumbnail size into the configured range. An
    /// unparsable or absent request falls back to the default.
    pub fn clamp_thumbnail_size(&self, requested: Option<u32>) -> u32 {
        match requested {
            Some(size) => {
                size.clamp(self.min_thumbnail_size, self.max_thumbnail_size)
            }
            None => self.default_thumbnail_size,
        }
    }

    /// The static poster used when a movie frame cannot be grabbed.
    pub fn movie_placeholder(&self) -> PathBuf {
        self.data_dir.join("movie.png")
    }

    pub fn grab_wall_clock(&self) -> Duration {
        Duration::from_secs(self.grab_wall_clock_secs)
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy() {
        let config = Config::with_data_dir("/tmp/pictbook");
        assert_eq!(config.default_thumbnail_size, 150);
        assert_eq!(config.min_thumbnail_size, 32);
        assert_eq!(config.max_thumbnail_size, 640);
        assert_eq!(config.movie_overlay_alpha, 0.5);
        assert_eq!(
            config.movie_placeholder(),
            PathBuf::from("/tmp/pictbook/movie.png")
        );
    }

    #[test]
    fn size_clamping() {
        let config = Config::with_data_dir("/tmp/pictbook");
        assert_eq!(config.clamp_thumbnail_size(None), 150);
        assert_eq!(config.clamp_thumbnail_size(Some(10)), 32);
        assert_eq!(config.clamp_thumbnail_size(Some(150)), 150);
        assert_eq!(config.clamp_thumbnail_size(Some(5000)), 640);
    }

    #[test]
    fn rejects_bad_alpha() {
        let mut config = Config::with_data_dir("/tmp/pictbook");
        config.movie_overlay_alpha = 1.5;
        assert!(config.validate().is_err());
    }
}
