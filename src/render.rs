use eframe::egui::ColorImage;
use rayon::prelude::*;

use crate::zoom::CropBox;

/// Logical size of the drawing surface in pixels, independent of the loaded
/// volume's slice dimensions.
pub const SURFACE_SIZE: usize = 512;

/// Map one raw sample to a grayscale RGBA quad by taking its low 8 bits.
/// Intentionally no windowing and no min/max normalization: values wrap
/// modulo 256, negatives included (`-1` maps to `255`).
pub fn map_pixel(raw: f64) -> [u8; 4] {
    let v = (raw as i64) as u8;
    [v, v, v, 0xff]
}

/// Fixed-size RGBA canvas the slice pipeline draws into.
pub struct Surface {
    pixels: Vec<u8>,
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface {
    pub fn new() -> Self {
        Self {
            pixels: vec![0; SURFACE_SIZE * SURFACE_SIZE * 4],
        }
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.pixels
    }

    pub fn to_color_image(&self) -> ColorImage {
        ColorImage::from_rgba_unmultiplied([SURFACE_SIZE, SURFACE_SIZE], self.as_rgba())
    }

    // Copy a cols x rows RGBA buffer to the top-left corner, clipped to the
    // surface. Pixels outside the committed region keep their contents.
    fn blit(&mut self, cols: usize, rows: usize, rgba: &[u8]) {
        let copy_cols = cols.min(SURFACE_SIZE);
        for row in 0..rows.min(SURFACE_SIZE) {
            let src = row * cols * 4;
            let dst = row * SURFACE_SIZE * 4;
            self.pixels[dst..dst + copy_cols * 4]
                .copy_from_slice(&rgba[src..src + copy_cols * 4]);
        }
    }
}

/// Fill a `cols` x `rows` pixel buffer row-major from `pixel_source` and
/// commit it to the surface at the origin. No scaling happens here; a slice
/// smaller than the surface only covers the top-left region.
pub fn render_slice(
    surface: &mut Surface,
    cols: usize,
    rows: usize,
    pixel_source: impl Fn(usize, usize) -> [u8; 4] + Sync,
) {
    let mapped: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .flat_map(|col| pixel_source(row, col))
                .collect::<Vec<u8>>()
        })
        .collect();

    surface.blit(cols, rows, &mapped);
}

/// Stretch the crop region of the current surface contents over the whole
/// canvas with nearest-neighbor sampling, replacing everything that was
/// there.
pub fn magnify(surface: &mut Surface, crop: CropBox) {
    let src = surface.pixels.clone();

    surface.pixels = (0..SURFACE_SIZE)
        .into_par_iter()
        .flat_map(|dst_row| {
            let src_row = crop.y + nearest(dst_row, crop.height);
            (0..SURFACE_SIZE)
                .flat_map(|dst_col| {
                    let src_col = crop.x + nearest(dst_col, crop.width);
                    let at = (src_row * SURFACE_SIZE + src_col) * 4;
                    [src[at], src[at + 1], src[at + 2], src[at + 3]]
                })
                .collect::<Vec<u8>>()
        })
        .collect();
}

// Map a destination coordinate onto a crop extent, sampling pixel centers.
fn nearest(dst: usize, extent: usize) -> usize {
    let pos = (dst as f32 + 0.5) * extent as f32 / SURFACE_SIZE as f32;
    (pos as usize).min(extent - 1)
}
