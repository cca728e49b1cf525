use std::io::BufWriter;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{PictError, Result};
use crate::util::path_extension;

/// Decoded dimensions above these bounds are refused outright; a huge
/// image could exhaust memory before the resize even starts.
pub const MAX_DIMENSION: u32 = 5000;
pub const MAX_PIXELS: u64 = 10_000_000;

/// Output encoding for a cache file extension. We never write gif (no
/// encoder worth using), png takes its place.
pub fn output_format_for(extension: &str) -> Result<ImageFormat> {
    let format = ImageFormat::from_extension(extension)
        .ok_or_else(|| PictError::UnsupportedFormat(extension.to_string()))?;
    Ok(match format {
        ImageFormat::Gif => ImageFormat::Png,
        other => other,
    })
}

/// Refuse dimensions outside the safety bounds.
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width > MAX_DIMENSION
        || height > MAX_DIMENSION
        || u64::from(width) * u64::from(height) > MAX_PIXELS
    {
        return Err(PictError::OversizedInput { width, height });
    }
    Ok(())
}

/// Decode a still image, probing the header for its dimensions first so
/// oversized inputs are rejected before any pixel data is touched.
pub fn load_bounded(path: &Path) -> Result<DynamicImage> {
    let extension = path_extension(path);
    if ImageFormat::from_extension(extension).is_none() {
        return Err(PictError::UnsupportedFormat(extension.to_string()));
    }

    let (width, height) = ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| PictError::Decode(format!("{}: {e}", path.display())))?;
    check_dimensions(width, height)?;

    let image = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| PictError::Decode(format!("{}: {e}", path.display())))?;
    debug!("Decoded {} at {}x{}", path.display(), width, height);
    Ok(image)
}

/// Scale down to at most `max_width` pixels wide, preserving aspect ratio.
/// Never upscales: a request wider than the source comes back unchanged.
/// Triangle filtering averages over source pixels, which is what a
/// downscaled thumbnail needs; point sampling looks visibly worse.
pub fn scale(image: &DynamicImage, max_width: u32) -> DynamicImage {
    let width = image.width();
    let height = image.height();
    let out_width = max_width.min(width).max(1);
    if out_width == width {
        return image.clone();
    }
    let out_height = (u64::from(height) * u64::from(out_width)
        / u64::from(width))
    .max(1) as u32;
    image.resize_exact(out_width, out_height, FilterType::Triangle)
}

/// Encode to `target` atomically: write a sibling temp file, then persist
/// over the final name so a concurrent reader never sees a partial file.
pub fn encode_atomic(
    image: &DynamicImage,
    target: &Path,
    format: ImageFormat,
) -> Result<()> {
    let parent = target.parent().ok_or_else(|| {
        PictError::Internal(format!("no parent dir for {}", target.display()))
    })?;
    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        // Jpeg has no alpha channel; flatten before encoding.
        let result = if format == ImageFormat::Jpeg {
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_to(&mut writer, format)
        } else {
            image.write_to(&mut writer, format)
        };
        result.map_err(|e| {
            PictError::Encode(format!("{}: {e}", target.display()))
        })?;
        std::io::Write::flush(&mut writer)?;
    }
    temp.persist(target).map_err(|e| PictError::Io(e.error))?;
    debug!("Wrote {}", target.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn oversize_is_rejected_before_any_resize() {
        assert!(matches!(
            check_dimensions(6000, 6000),
            Err(PictError::OversizedInput {
                width: 6000,
                height: 6000
            })
        ));
        // Each side in range but the pixel count is not.
        assert!(check_dimensions(4000, 4000).is_err());
        assert!(check_dimensions(4999, 2000).is_ok());
    }

    #[test]
    fn aspect_ratio_preserved() {
        let image = gradient(800, 600);
        let scaled = scale(&image, 150);
        assert_eq!(scaled.width(), 150);
        assert_eq!(scaled.height(), 112); // 600 * 150 / 800
    }

    #[test]
    fn never_upscales() {
        let image = gradient(320, 200);
        let scaled = scale(&image, 1000);
        assert_eq!(scaled.width(), 320);
        assert_eq!(scaled.height(), 200);
    }

    #[test]
    fn tiny_targets_stay_at_least_one_pixel() {
        let image = gradient(500, 2);
        let scaled = scale(&image, 10);
        assert_eq!(scaled.width(), 10);
        assert_eq!(scaled.height(), 1);
    }

    #[test]
    fn gif_output_becomes_png() {
        assert_eq!(output_format_for("gif").unwrap(), ImageFormat::Png);
        assert_eq!(output_format_for("jpg").unwrap(), ImageFormat::Jpeg);
        assert_eq!(output_format_for("png").unwrap(), ImageFormat::Png);
        assert!(output_format_for("avi").is_err());
    }

    #[test]
    fn unsupported_source_extension_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.avi");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(matches!(
            load_bounded(&path),
            Err(PictError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn corrupt_image_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"jpeg? hardly").unwrap();
        assert!(load_bounded(&path).is_err());
    }

    #[test]
    fn encode_roundtrip_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.png");
        encode_atomic(&gradient(20, 10), &target, ImageFormat::Png).unwrap();
        let back = image::open(&target).unwrap();
        assert_eq!((back.width(), back.height()), (20, 10));
        // No temp leftovers next to the target.
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("out.png")]);
    }
}
