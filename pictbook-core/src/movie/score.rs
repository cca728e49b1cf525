//! "Boring frame" heuristic.
//!
//! A frame is split into four quadrants; a quadrant whose three color
//! channels all have variance below 40 squared is close to a flat color
//! and counts as boring. A frame qualifies as a thumbnail when at least
//! two quadrants are non-boring. Pixel formats the heuristic does not
//! understand qualify automatically; the heuristic only actively rejects
//! what it can read.

use ffmpeg_next as ffmpeg;

/// Channel variance below this makes a channel "flat"; a quadrant is
/// boring when all three channels are flat.
pub const BORING_VARIANCE_THRESHOLD: f32 = 40.0 * 40.0;

/// Quadrants that must be non-boring for a frame to qualify.
pub const QUALIFYING_QUADRANTS: u8 = 2;

#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    pub stride: usize,
}

/// A borrowed, format-tagged view of one decoded frame's pixels.
#[derive(Debug)]
pub enum PixelFrame<'a> {
    Rgb {
        data: &'a [u8],
        stride: usize,
        bytes_per_pixel: usize,
        width: u32,
        height: u32,
    },
    Yuv {
        y: Plane<'a>,
        u: Plane<'a>,
        v: Plane<'a>,
        /// log2 horizontal/vertical chroma subsampling
        shift_x: u32,
        shift_y: u32,
        width: u32,
        height: u32,
    },
    /// Format the heuristic cannot read. Automatically qualifies.
    Opaque,
}

impl<'a> PixelFrame<'a> {
    pub fn from_video_frame(frame: &'a ffmpeg::frame::Video) -> Self {
        use ffmpeg::format::Pixel;

        let width = frame.width();
        let height = frame.height();
        match frame.format() {
            Pixel::RGB24 => PixelFrame::Rgb {
                data: frame.data(0),
                stride: frame.stride(0),
                bytes_per_pixel: 3,
                width,
                height,
            },
            Pixel::RGBA => PixelFrame::Rgb {
                data: frame.data(0),
                stride: frame.stride(0),
                bytes_per_pixel: 4,
                width,
                height,
            },
            Pixel::YUV420P | Pixel::YUVJ420P => yuv(frame, 1, 1),
            Pixel::YUV422P | Pixel::YUVJ422P => yuv(frame, 1, 0),
            Pixel::YUV444P | Pixel::YUVJ444P => yuv(frame, 0, 0),
            _ => PixelFrame::Opaque,
        }
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            PixelFrame::Rgb { width, height, .. }
            | PixelFrame::Yuv { width, height, .. } => Some((*width, *height)),
            PixelFrame::Opaque => None,
        }
    }

    /// RGB value at (x, y), converting from YUV where needed using the
    /// usual luma/chroma coefficients.
    fn rgb_at(&self, x: u32, y: u32) -> (f32, f32, f32) {
        match self {
            PixelFrame::Rgb {
                data,
                stride,
                bytes_per_pixel,
                ..
            } => {
                let offset = y as usize * stride + x as usize * bytes_per_pixel;
                (
                    f32::from(data[offset]),
                    f32::from(data[offset + 1]),
                    f32::from(data[offset + 2]),
                )
            }
            PixelFrame::Yuv {
                y: y_plane,
                u: u_plane,
                v: v_plane,
                shift_x,
                shift_y,
                ..
            } => {
                let luma = f32::from(
                    y_plane.data[y as usize * y_plane.stride + x as usize],
                );
                let cx = (x >> shift_x) as usize;
                let cy = (y >> shift_y) as usize;
                let u = f32::from(u_plane.data[cy * u_plane.stride + cx]);
                let v = f32::from(v_plane.data[cy * v_plane.stride + cx]);
                let r = luma + 1.401_686_8 * (v - 128.0);
                let g = luma
                    - 0.343_695_4 * (u - 128.0)
                    - 0.714_169_0 * (v - 128.0);
                let b = luma + 1.772_160_4 * (u - 128.0);
                (
                    r.clamp(0.0, 255.0),
                    g.clamp(0.0, 255.0),
                    b.clamp(0.0, 255.0),
                )
            }
            PixelFrame::Opaque => (0.0, 0.0, 0.0),
        }
    }
}

/// Count the quadrants interesting enough to show, or `None` when the
/// format is unreadable and the frame qualifies by default.
pub fn interesting_quadrants(frame: &PixelFrame<'_>) -> Option<u8> {
    let (width, height) = frame.dimensions()?;
    let half_w = width / 2;
    let half_h = height / 2;
    if half_w == 0 || half_h == 0 {
        // Degenerate frame; nothing sensible to measure.
        return Some(0);
    }

    let quadrants = [
        (0, 0),
        (half_w, 0),
        (0, half_h),
        (half_w, half_h),
    ];
    let mut interesting = 0u8;
    for (start_x, start_y) in quadrants {
        if !region_is_boring(frame, start_x, start_y, half_w, half_h) {
            interesting += 1;
        }
    }
    Some(interesting)
}

/// Whether the frame should be used as the movie's thumbnail.
pub fn frame_qualifies(frame: &PixelFrame<'_>) -> bool {
    match interesting_quadrants(frame) {
        Some(count) => count >= QUALIFYING_QUADRANTS,
        None => true,
    }
}

fn region_is_boring(
    frame: &PixelFrame<'_>,
    start_x: u32,
    start_y: u32,
    width: u32,
    height: u32,
) -> bool {
    // Sum and sum-of-squares per channel; variance = E[x^2] - E[x]^2.
    let mut sums = [0.0f64; 3];
    let mut squares = [0.0f64; 3];
    let count = f64::from(width) * f64::from(height);

    for y in start_y..start_y + height {
        for x in start_x..start_x + width {
            let (r, g, b) = frame.rgb_at(x, y);
            for (i, value) in [r, g, b].into_iter().enumerate() {
                let value = f64::from(value);
                sums[i] += value;
                squares[i] += value * value;
            }
        }
    }

    (0..3).all(|i| {
        let mean = sums[i] / count;
        let variance = squares[i] / count - mean * mean;
        variance < f64::from(BORING_VARIANCE_THRESHOLD)
    })
}

fn yuv(frame: &ffmpeg::frame::Video, shift_x: u32, shift_y: u32) -> PixelFrame<'_> {
    PixelFrame::Yuv {
        y: Plane {
            data: frame.data(0),
            stride: frame.stride(0),
        },
        u: Plane {
            data: frame.data(1),
            stride: frame.stride(1),
        },
        v: Plane {
            data: frame.data(2),
            stride: frame.stride(2),
        },
        shift_x,
        shift_y,
        width: frame.width(),
        height: frame.height(),
    }
}
