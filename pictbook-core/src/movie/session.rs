//! One movie-frame grab, run to completion on a blocking thread.
//!
//! The session is an explicit state machine over an ffmpeg decode:
//! `Unopened -> Configured` (demuxer open), `-> Realized` (video track
//! picked, decoder built), `-> Started` (packet scan), and then one of the
//! terminal `FrameFound`, `TimedOut` or `Failed` before `Closed`. Any
//! decoder failure drops straight to `Failed`; no further progress is
//! attempted.

use std::path::PathBuf;
use std::time::Instant;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::scaling;
use image::{DynamicImage, RgbImage};
use tracing::{debug, trace, warn};

use crate::error::{PictError, Result};
use crate::movie::score::{PixelFrame, frame_qualifies};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabPhase {
    Unopened,
    Configured,
    Realized,
    Started,
    FrameFound,
    TimedOut,
    Failed,
    Closed,
}

/// Most recent usable frame, threaded through the scan loop instead of
/// living in shared mutable state.
struct BestCandidate {
    image: RgbImage,
    pts_secs: f64,
    qualified: bool,
}

/// Stream-time book-keeping for the scan loop: which frames are worth
/// scoring and when the scan stops. Kept apart from the decode so the
/// skip and cutoff sequencing can be driven on synthetic timestamps.
#[derive(Debug)]
struct ScanClock {
    boring_skip_secs: f64,
    scan_cutoff_secs: f64,
    last_boring_pts: Option<f64>,
    have_fallback: bool,
}

impl ScanClock {
    fn new(boring_skip_secs: f64, scan_cutoff_secs: f64) -> Self {
        Self {
            boring_skip_secs,
            scan_cutoff_secs,
            last_boring_pts: None,
            have_fallback: false,
        }
    }

    /// Frames shortly after a boring one look the same; while a fallback
    /// exists they are not worth converting and scoring.
    fn should_score(&self, pts_secs: f64) -> bool {
        match self.last_boring_pts {
            Some(boring_at) if self.have_fallback => {
                pts_secs >= boring_at + self.boring_skip_secs
            }
            _ => true,
        }
    }

    /// Record a scored frame. True when the scan stops here, either
    /// because the frame qualifies or the stream-time cutoff has passed
    /// and the most recent frame is as good as it gets.
    fn settle(&mut self, pts_secs: f64, qualified: bool) -> bool {
        if qualified || pts_secs > self.scan_cutoff_secs {
            return true;
        }
        self.last_boring_pts = Some(pts_secs);
        self.have_fallback = true;
        false
    }
}

pub struct GrabSession {
    source: PathBuf,
    phase: GrabPhase,
    /// Stream seconds to skip after a boring frame.
    boring_skip_secs: f64,
    /// Stream-time mark where the scan settles for what it has.
    scan_cutoff_secs: f64,
    /// Wall-clock point after which the scan aborts.
    deadline: Instant,
}

impl std::fmt::Debug for GrabSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrabSession")
            .field("source", &self.source)
            .field("phase", &self.phase)
            .finish()
    }
}

impl GrabSession {
    pub fn new(
        source: PathBuf,
        boring_skip_secs: f64,
        scan_cutoff_secs: f64,
        deadline: Instant,
    ) -> Self {
        Self {
            source,
            phase: GrabPhase::Unopened,
            boring_skip_secs,
            scan_cutoff_secs,
            deadline,
        }
    }

    /// Run the whole session and return the chosen frame as an RGB image.
    pub fn run(mut self) -> Result<DynamicImage> {
        let result = self.grab();
        if result.is_err() {
            self.phase = GrabPhase::Failed;
        }
        let phase = self.phase;
        self.phase = GrabPhase::Closed;
        trace!("Grab session for {} ended in {phase:?}", self.source.display());
        result
    }

    fn grab(&mut self) -> Result<DynamicImage> {
        let mut input = self.configure()?;
        let (stream_index, time_base, mut decoder) = self.realize(&input)?;

        self.phase = GrabPhase::Started;
        let candidate =
            self.scan(&mut input, stream_index, time_base, &mut decoder)?;

        self.phase = if candidate.qualified {
            GrabPhase::FrameFound
        } else {
            GrabPhase::TimedOut
        };
        debug!(
            "Grabbed frame from {} at {:.2}s (qualified: {})",
            self.source.display(),
            candidate.pts_secs,
            candidate.qualified
        );
        Ok(DynamicImage::ImageRgb8(candidate.image))
    }

    /// `Unopened -> Configured`: open the demuxer.
    fn configure(&mut self) -> Result<ffmpeg::format::context::Input> {
        let input = ffmpeg::format::input(&self.source).map_err(|e| {
            PictError::Decode(format!(
                "cannot open {}: {e}",
                self.source.display()
            ))
        })?;
        self.phase = GrabPhase::Configured;
        Ok(input)
    }

    /// `Configured -> Realized`: pick the first video track, ignore every
    /// other track, and build the decoder. Audio-only media fails here.
    fn realize(
        &mut self,
        input: &ffmpeg::format::context::Input,
    ) -> Result<(usize, ffmpeg::Rational, ffmpeg::decoder::Video)> {
        let stream = input
            .streams()
            .find(|s| {
                s.parameters().medium() == ffmpeg::media::Type::Video
            })
            .ok_or_else(|| PictError::NoVideoTrack(self.source.clone()))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let context = ffmpeg::codec::context::Context::from_parameters(
            stream.parameters(),
        )?;
        let decoder = context.decoder().video().map_err(|e| {
            PictError::Decode(format!(
                "no decoder for {}: {e}",
                self.source.display()
            ))
        })?;

        self.phase = GrabPhase::Realized;
        Ok((stream_index, time_base, decoder))
    }

    /// The scan loop: decode frames in stream order, skip the window after
    /// a boring frame, stop on the first qualifying frame or at the
    /// stream-time cutoff, and keep the most recent frame as fallback.
    fn scan(
        &mut self,
        input: &mut ffmpeg::format::context::Input,
        stream_index: usize,
        time_base: ffmpeg::Rational,
        decoder: &mut ffmpeg::decoder::Video,
    ) -> Result<BestCandidate> {
        let tb = f64::from(time_base.numerator())
            / f64::from(time_base.denominator());
        let mut converter: Option<scaling::Context> = None;
        let mut best: Option<BestCandidate> = None;
        let mut clock =
            ScanClock::new(self.boring_skip_secs, self.scan_cutoff_secs);
        let mut frame = ffmpeg::frame::Video::empty();

        for (stream, packet) in input.packets() {
            if stream.index() != stream_index {
                continue;
            }
            if Instant::now() > self.deadline {
                warn!(
                    "Frame grab for {} hit its wall-clock ceiling",
                    self.source.display()
                );
                return best.ok_or_else(|| {
                    PictError::Timeout(self.source.display().to_string())
                });
            }
            if let Err(e) = decoder.send_packet(&packet) {
                trace!("Dropping undecodable packet: {e}");
                continue;
            }
            while decoder.receive_frame(&mut frame).is_ok() {
                let pts_secs =
                    frame.pts().or(frame.timestamp()).unwrap_or(0) as f64 * tb;

                if !clock.should_score(pts_secs) {
                    continue;
                }

                let image = convert_to_rgb(&mut converter, decoder, &frame)?;
                let qualified =
                    frame_qualifies(&PixelFrame::from_video_frame(&frame));
                let candidate = BestCandidate {
                    image,
                    pts_secs,
                    qualified,
                };
                if clock.settle(pts_secs, qualified) {
                    return Ok(candidate);
                }
                best = Some(candidate);
            }
        }

        // Stream shorter than the cutoff: drain the decoder, then fall
        // back to the last frame seen.
        let _ = decoder.send_eof();
        while decoder.receive_frame(&mut frame).is_ok() {
            let pts_secs =
                frame.pts().or(frame.timestamp()).unwrap_or(0) as f64 * tb;
            let image = convert_to_rgb(&mut converter, decoder, &frame)?;
            let qualified =
                frame_qualifies(&PixelFrame::from_video_frame(&frame));
            best = Some(BestCandidate {
                image,
                pts_secs,
                qualified,
            });
            if qualified {
                break;
            }
        }

        best.ok_or_else(|| {
            PictError::Decode(format!(
                "no frame decodable in {}",
                self.source.display()
            ))
        })
    }

    #[cfg(test)]
    pub fn phase(&self) -> GrabPhase {
        self.phase
    }
}

/// Convert a decoded frame to packed RGB24 at its native size. The
/// converter is created on first use and reused for the whole scan.
fn convert_to_rgb(
    converter: &mut Option<scaling::Context>,
    decoder: &ffmpeg::decoder::Video,
    frame: &ffmpeg::frame::Video,
) -> Result<RgbImage> {
    if converter.is_none() {
        *converter = Some(scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            scaling::Flags::BILINEAR,
        )?);
    }
    let context = converter
        .as_mut()
        .ok_or_else(|| PictError::Internal("frame converter missing".into()))?;

    let mut rgb_frame = ffmpeg::frame::Video::empty();
    context.run(frame, &mut rgb_frame)?;

    let width = rgb_frame.width();
    let height = rgb_frame.height();
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);

    let row_bytes = width as usize * 3;
    let pixels = if stride == row_bytes {
        data[..row_bytes * height as usize].to_vec()
    } else {
        // Strip the per-row padding ffmpeg aligns planes with.
        let mut clean = Vec::with_capacity(row_bytes * height as usize);
        for y in 0..height as usize {
            let start = y * stride;
            clean.extend_from_slice(&data[start..start + row_bytes]);
        }
        clean
    };

    RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
        PictError::Internal(format!("bad frame buffer {width}x{height}"))
    })
}
