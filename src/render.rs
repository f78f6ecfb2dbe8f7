//! Frame renderer: turns a finalized [`BinRaster`] plus the accumulated
//! [`ResidueMap`] into a binary PPM (P6) image, applying the non-routable
//! overlay and an optional timestamp strip.

mod font;

use crate::mask::NonRoutableMask;
use crate::raster::BinRaster;
use crate::residue::ResidueMap;

/// Margin in pixels around the timestamp strip's glyph baseline.
const STRIP_MARGIN: u32 = 8;
/// Strip height: one glyph row plus a margin above and below.
const STRIP_HEIGHT: u32 = font::GLYPH_HEIGHT + 2 * STRIP_MARGIN;
const GLYPH_SCALE: u32 = 3;
const GLYPH_ADVANCE: u32 = (font::GLYPH_WIDTH + 1) * GLYPH_SCALE;

/// Extra image height consumed by the optional timestamp strip.
pub fn strip_height() -> u32 {
    STRIP_HEIGHT
}

#[derive(Debug, Clone, Copy)]
pub struct RenderParams {
    pub image_width: u32,
    pub image_height: u32,
    pub show_timestamp: bool,
}

/// One RGB triple, 0-255 per channel.
type Rgb = (u8, u8, u8);

/// Maps a cell's raw intensity `v` against the bin's `max_intensity` onto
/// the white -> yellow -> red ramp, floored at 50% brightness so that any
/// nonzero cell stays visible. `v == 0` is always black.
fn intensity_color(v: u32, max_intensity: u32) -> Rgb {
    if v == 0 {
        return (0, 0, 0);
    }
    let n = v as f64 / max_intensity.max(1) as f64;
    let e = (0.5 + 0.5 * n).clamp(0.5, 1.0);
    let t = (e - 0.5) / 0.5;
    if t < 0.5 {
        let frac = 1.0 - 2.0 * t;
        (255, 255, (255.0 * frac).round() as u8)
    } else {
        let frac = 2.0 - 2.0 * t;
        (255, (255.0 * frac).round() as u8, 0)
    }
}

/// Resolves the color for a single cell. Priority order: residue-grey
/// for idle-but-previously-active cells, a dark blue for idle
/// non-routable cells, and the intensity ramp
/// (optionally blended toward blue) otherwise.
fn cell_color(v: u32, residue: u32, non_routable: bool, max_intensity: u32) -> Rgb {
    if v == 0 && residue > 0 && !non_routable {
        return (54, 54, 54);
    }
    if v == 0 && non_routable {
        return (0, 0, 30);
    }
    let (r, g, b) = intensity_color(v, max_intensity);
    if non_routable {
        (
            (r as f64 * 0.6) as u8,
            (g as f64 * 0.6) as u8,
            (b as f64 * 0.6 + 12.0) as u8,
        )
    } else {
        (r, g, b)
    }
}

/// Scale and centering offsets for painting a `dimension x dimension` grid
/// into a `width x height` canvas. Mirrors the original renderer's
/// landscape/portrait centering: the grid is scaled uniformly (floating
/// point, so a grid larger than the canvas downsamples correctly instead
/// of collapsing to a single pixel) and centered along the other axis.
struct Placement {
    scale: f64,
    offset_x: u32,
    offset_y: u32,
    square_w: u32,
    square_h: u32,
}

fn placement(dimension: u32, width: u32, height: u32) -> Placement {
    let (scale, offset_x, offset_y) = if width >= height {
        let scale = height as f64 / dimension as f64;
        let square = (dimension as f64 * scale) as u32;
        (scale, width.saturating_sub(square) / 2, 0)
    } else {
        let scale = width as f64 / dimension as f64;
        let square = (dimension as f64 * scale) as u32;
        (scale, 0, height.saturating_sub(square) / 2)
    };
    Placement {
        scale,
        offset_x,
        offset_y,
        square_w: (dimension as f64 * scale) as u32,
        square_h: (dimension as f64 * scale) as u32,
    }
}

/// Renders `bin` into a PPM (P6) byte buffer. `residue` supplies the
/// persistent per-cell afterglow, `mask` the non-routable overlay.
pub fn render(
    bin: &BinRaster,
    residue: &ResidueMap,
    mask: &NonRoutableMask,
    params: &RenderParams,
) -> Vec<u8> {
    let dimension = bin.dimension();
    let grid_height = params.image_height
        - if params.show_timestamp {
            STRIP_HEIGHT
        } else {
            0
        };
    let place = placement(dimension, params.image_width, grid_height);
    let max_intensity = bin.max_intensity.max(1);

    let mut pixels = vec![0u8; (params.image_width * params.image_height) as usize * 3];
    let stride = params.image_width as usize;

    for py in place.offset_y..(place.offset_y + place.square_h).min(grid_height) {
        for px in place.offset_x..(place.offset_x + place.square_w).min(params.image_width) {
            let sx = ((px - place.offset_x) as f64 / place.scale) as u32;
            let sy = ((py - place.offset_y) as f64 / place.scale) as u32;
            if sx >= dimension || sy >= dimension {
                continue;
            }
            let idx = (sy * dimension + sx) as usize;
            let v = bin.heatmap[idx];
            let residue_count = residue.get(sx, sy);
            let non_routable = mask.bit(idx as u32);
            let color = cell_color(v, residue_count, non_routable, max_intensity);

            let off = (py as usize * stride + px as usize) * 3;
            pixels[off] = color.0;
            pixels[off + 1] = color.1;
            pixels[off + 2] = color.2;
        }
    }

    if params.show_timestamp {
        draw_timestamp_strip(&mut pixels, params, bin.bin_start, grid_height);
    }

    let header = format!("P6\n{} {}\n255\n", params.image_width, params.image_height);
    let mut out = Vec::with_capacity(header.len() + pixels.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&pixels);
    out
}

/// Draws `bin_start` as a calendar timestamp in the strip below the grid.
fn draw_timestamp_strip(pixels: &mut [u8], params: &RenderParams, bin_start: i64, strip_top: u32) {
    let text = crate::timefmt::format_timestamp(bin_start);
    let stride = params.image_width as usize;
    let mut cursor_x = STRIP_MARGIN;
    let baseline_y = strip_top + STRIP_MARGIN;

    for c in text.chars() {
        let Some(glyph) = font::glyph_for(c) else {
            cursor_x += GLYPH_ADVANCE;
            continue;
        };
        for row in 0..font::GLYPH_HEIGHT {
            for col in 0..font::GLYPH_WIDTH {
                if !font::glyph_pixel(glyph, row, col) {
                    continue;
                }
                for sy in 0..GLYPH_SCALE {
                    let py = baseline_y + row * GLYPH_SCALE + sy;
                    if py >= params.image_height {
                        continue;
                    }
                    for sx in 0..GLYPH_SCALE {
                        let px = cursor_x + col * GLYPH_SCALE + sx;
                        if px >= params.image_width {
                            continue;
                        }
                        let off = (py as usize * stride + px as usize) * 3;
                        pixels[off] = 255;
                        pixels[off + 1] = 255;
                        pixels[off + 2] = 255;
                    }
                }
            }
        }
        cursor_x += GLYPH_ADVANCE;
    }
}
