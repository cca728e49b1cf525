use image::{DynamicImage, Rgba, RgbaImage};

/// Inset of the play-glyph triangle from the bottom-right corner, in
/// pixels: tip 5 from the right edge, base 20, vertically 25/15/5 up from
/// the bottom.
const TRIANGLE_INSETS: [(i64, i64); 3] = [(20, 25), (5, 15), (20, 5)];
const STROKE_HALF_WIDTH: f32 = 1.5;

/// Draw a semi-transparent "play" triangle in the lower right corner,
/// marking a thumbnail as a movie. Outline is a ~3 px opaque black
/// stroke, the fill is white at the given transparency. Images smaller
/// than the glyph (about 20x25) get a clipped glyph, never an error.
pub fn apply_play_glyph(image: DynamicImage, fill_alpha: f32) -> DynamicImage {
    let mut canvas = image.into_rgba8();
    let (width, height) = (canvas.width() as i64, canvas.height() as i64);

    let corners: Vec<(f32, f32)> = TRIANGLE_INSETS
        .iter()
        .map(|(dx, dy)| ((width - dx) as f32, (height - dy) as f32))
        .collect();

    // Bounding box of stroke + fill, clipped to the image.
    let pad = STROKE_HALF_WIDTH.ceil() as i64;
    let min_x = (width - 20 - pad).max(0);
    let min_y = (height - 25 - pad).max(0);
    let max_x = (width - 5 + pad).min(width - 1);
    let max_y = (height - 5 + pad).min(height - 1);

    let alpha = fill_alpha.clamp(0.0, 1.0);
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let px = x as f32;
            let py = y as f32;
            if inside_triangle(px, py, &corners) {
                blend_white(&mut canvas, x as u32, y as u32, alpha);
            }
            // Stroke wins over fill so the outline stays crisp.
            let on_stroke = corners.iter().enumerate().any(|(i, &a)| {
                let b = corners[(i + 1) % corners.len()];
                segment_distance(px, py, a, b) <= STROKE_HALF_WIDTH
            });
            if on_stroke {
                canvas.put_pixel(x as u32, y as u32, Rgba([0, 0, 0, 255]));
            }
        }
    }

    DynamicImage::ImageRgba8(canvas)
}

fn blend_white(canvas: &mut RgbaImage, x: u32, y: u32, alpha: f32) {
    let pixel = canvas.get_pixel_mut(x, y);
    for channel in pixel.0.iter_mut().take(3) {
        let blended = 255.0 * alpha + f32::from(*channel) * (1.0 - alpha);
        *channel = blended.round() as u8;
    }
    pixel.0[3] = 255;
}

fn inside_triangle(px: f32, py: f32, corners: &[(f32, f32)]) -> bool {
    let sign = |a: (f32, f32), b: (f32, f32)| {
        (px - b.0) * (a.1 - b.1) - (a.0 - b.0) * (py - b.1)
    };
    let d0 = sign(corners[0], corners[1]);
    let d1 = sign(corners[1], corners[2]);
    let d2 = sign(corners[2], corners[0]);
    let has_neg = d0 < 0.0 || d1 < 0.0 || d2 < 0.0;
    let has_pos = d0 > 0.0 || d1 > 0.0 || d2 > 0.0;
    !(has_neg && has_pos)
}

fn segment_distance(px: f32, py: f32, a: (f32, f32), b: (f32, f32)) -> f32 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let (apx, apy) = (px - a.0, py - a.1);
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        ((apx * abx + apy * aby) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * abx, a.1 + t * aby);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}
