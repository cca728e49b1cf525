//! Movie key-frame extraction.

mod session;

pub mod score;

pub use session::{GrabPhase, GrabSession};

use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use image::ImageFormat;
use tracing::info;

use crate::config::Config;
use crate::error::{PictError, Result};
use crate::scale;

static FFMPEG_INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();

fn ensure_ffmpeg() -> Result<()> {
    FFMPEG_INIT
        .get_or_init(|| {
            ffmpeg_next::init().map_err(|e| format!("ffmpeg init: {e}"))
        })
        .clone()
        .map_err(PictError::Internal)
}

/// Grabs a representative, non-boring frame from the start of a movie and
/// writes it as a jpeg. The caller is expected to treat every failure as
/// "use the placeholder poster instead".
#[derive(Debug, Clone)]
pub struct FrameGrabber {
    boring_skip_secs: f64,
    scan_cutoff_secs: f64,
    wall_clock: Duration,
}

impl FrameGrabber {
    pub fn new(config: &Config) -> Result<Self> {
        ensure_ffmpeg()?;
        Ok(Self {
            boring_skip_secs: config.boring_skip_secs,
            scan_cutoff_secs: config.scan_cutoff_secs,
            wall_clock: config.grab_wall_clock(),
        })
    }

    /// Scan a bounded prefix of `source` and persist the chosen frame to
    /// `dest` atomically. Blocking decode work runs off the async
    /// runtime; the call itself returns once a terminal state is reached
    /// or the wall-clock ceiling passes.
    pub async fn grab_poster_frame(
        &self,
        source: &Path,
        dest: &Path,
    ) -> Result<()> {
        let deadline = Instant::now() + self.wall_clock;
        let session = GrabSession::new(
            source.to_path_buf(),
            self.boring_skip_secs,
            self.scan_cutoff_secs,
            deadline,
        );

        let decode = tokio::task::spawn_blocking(move || session.run());
        // The in-loop deadline normally fires first; the outer timeout
        // only catches a demuxer that blocks without delivering packets.
        // A timed-out blocking task is abandoned, not cancelled.
        let frame = tokio::time::timeout(self.wall_clock * 2, decode)
            .await
            .map_err(|_| {
                PictError::Timeout(source.display().to_string())
            })?
            .map_err(|e| {
                PictError::Internal(format!("frame grab task died: {e}"))
            })??;

        scale::encode_atomic(&frame, dest, ImageFormat::Jpeg)?;
        info!(
            "Grabbed movie frame: {} -> {}",
            source.display(),
            dest.display()
        );
        Ok(())
    }
}
