use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PictError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    #[error("Source file not found: {0}")]
    NotFound(PathBuf),

    #[error("No codec for format: {0}")]
    UnsupportedFormat(String),

    #[error("Image too large to scale: {width}x{height}")]
    OversizedInput { width: u32, height: u32 },

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Movie has no usable video track: {0}")]
    NoVideoTrack(PathBuf),

    #[error("Frame grab timed out: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PictError {
    /// True when the error should degrade to serving the unscaled original
    /// instead of failing the request. Missing sources and write failures
    /// stay hard errors.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PictError::UnsupportedFormat(_)
                | PictError::OversizedInput { .. }
                | PictError::Decode(_)
                | PictError::Encode(_)
                | PictError::NoVideoTrack(_)
                | PictError::Timeout(_)
                | PictError::Ffmpeg(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PictError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_failures_degrade_but_file_failures_do_not() {
        assert!(PictError::Decode("bad header".into()).is_recoverable());
        assert!(PictError::Encode("no jpeg encoder".into()).is_recoverable());
        assert!(PictError::Timeout("clip.avi".into()).is_recoverable());

        let io = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(!PictError::Io(io).is_recoverable());
        assert!(!PictError::NotFound("a.jpg".into()).is_recoverable());
    }
}
