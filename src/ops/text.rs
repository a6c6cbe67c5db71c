use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};
use rayon::prelude::*;
use std::path::Path;

use crate::error::{CompositorError, CompositorResult};

/// Bold condensed display faces tried in order when no family is requested
/// (or the requested one is missing).
pub const DISPLAY_FACE_CANDIDATES: &[&str] = &[
    "Impact",
    "Anton",
    "Oswald",
    "Bebas Neue",
    "League Gothic",
    "Haettenschweiler",
    "DejaVu Sans Condensed",
    "Liberation Sans Narrow",
    "Arial Narrow",
];

/// Single-channel coverage buffer the size of the canvas.
/// Values are in `0.0..=1.0`; writes outside the buffer are dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct CoverageMask {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl CoverageMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Max-combine `coverage` into the pixel at (x, y).
    pub fn accumulate(&mut self, x: i32, y: i32, coverage: f32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = y as usize * self.width as usize + x as usize;
        let v = coverage.clamp(0.0, 1.0);
        if v > self.data[idx] {
            self.data[idx] = v;
        }
    }

    /// Copy out the `width` x `height` window starting at (`x0`, `y0`).
    pub fn crop(&self, x0: u32, y0: u32, width: u32, height: u32) -> CoverageMask {
        let mut out = CoverageMask::new(width, height);
        for y in 0..height {
            for x in 0..width {
                out.data[y as usize * width as usize + x as usize] = self.get(x0 + x, y0 + y);
            }
        }
        out
    }

    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&c| c <= 0.0)
    }

    /// First and last row holding any coverage.
    fn occupied_rows(&self) -> Option<(usize, usize)> {
        let w = self.width as usize;
        if w == 0 {
            return None;
        }
        let mut rows = self
            .data
            .chunks(w)
            .enumerate()
            .filter(|(_, row)| row.iter().any(|&c| c > 0.0))
            .map(|(y, _)| y);
        let first = rows.next()?;
        let last = rows.last().unwrap_or(first);
        Some((first, last))
    }
}

/// Turns a line of text into glyph coverage. The compositor only ever asks
/// for single-line, center-aligned text with the baseline at `baseline_y`.
pub trait GlyphRasterizer: Send + Sync {
    /// Advance width of `text` at `font_size` CSS pixels.
    fn measure(&self, text: &str, font_size: f32) -> f32;

    /// Draw `text` centered on `center_x` with its baseline at `baseline_y`.
    fn rasterize(
        &self,
        text: &str,
        font_size: f32,
        center_x: f32,
        baseline_y: f32,
        mask: &mut CoverageMask,
    );
}

/// Real-font rasterizer backed by ab_glyph.
#[derive(Clone)]
pub struct FontRasterizer {
    font: FontArc,
}

impl FontRasterizer {
    pub fn new(font: FontArc) -> Self {
        Self { font }
    }

    /// ab_glyph scales by line height; CSS font sizes are em sizes.
    fn px_scale(&self, font_size: f32) -> PxScale {
        let upem = self.font.units_per_em().unwrap_or(1000.0);
        PxScale::from(font_size * self.font.height_unscaled() / upem)
    }

    /// Lay out one line left-aligned at x=0.
    /// Returns `(glyphs as (id, x), total_width)`.
    fn layout_line(&self, text: &str, font_size: f32) -> (Vec<(GlyphId, f32)>, f32) {
        let scaled = self.font.as_scaled(self.px_scale(font_size));
        let mut glyphs = Vec::with_capacity(text.len());
        let mut cursor_x = 0.0f32;
        let mut last_glyph: Option<GlyphId> = None;

        for ch in text.chars() {
            let glyph_id = self.font.glyph_id(ch);
            if let Some(prev) = last_glyph {
                cursor_x += scaled.kern(prev, glyph_id);
            }
            glyphs.push((glyph_id, cursor_x));
            cursor_x += scaled.h_advance(glyph_id);
            last_glyph = Some(glyph_id);
        }

        (glyphs, cursor_x)
    }
}

impl GlyphRasterizer for FontRasterizer {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        self.layout_line(text, font_size).1
    }

    fn rasterize(
        &self,
        text: &str,
        font_size: f32,
        center_x: f32,
        baseline_y: f32,
        mask: &mut CoverageMask,
    ) {
        let scale = self.px_scale(font_size);
        let (glyphs, total_width) = self.layout_line(text, font_size);
        let left = center_x - total_width * 0.5;

        for (glyph_id, gx) in glyphs {
            let glyph = glyph_id.with_scale_and_position(scale, point(left + gx, baseline_y));
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                let bx = bounds.min.x as i32;
                let by = bounds.min.y as i32;
                outlined.draw(|px, py, cov| {
                    mask.accumulate(bx + px as i32, by + py as i32, cov);
                });
            }
        }
    }
}

/// Font-free rasterizer for headless use: every non-whitespace character is
/// a solid block `0.5em` wide and `0.7em` tall standing on the baseline,
/// with a fixed `0.6em` advance.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockRasterizer;

impl BlockRasterizer {
    pub const ADVANCE_EM: f32 = 0.6;
    const BLOCK_W_EM: f32 = 0.5;
    const BLOCK_H_EM: f32 = 0.7;
}

impl GlyphRasterizer for BlockRasterizer {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * Self::ADVANCE_EM
    }

    fn rasterize(
        &self,
        text: &str,
        font_size: f32,
        center_x: f32,
        baseline_y: f32,
        mask: &mut CoverageMask,
    ) {
        let advance = font_size * Self::ADVANCE_EM;
        let block_w = font_size * Self::BLOCK_W_EM;
        let left = center_x - self.measure(text, font_size) * 0.5;
        let y0 = (baseline_y - font_size * Self::BLOCK_H_EM).round() as i32;
        let y1 = baseline_y.round() as i32;

        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let gx = left + i as f32 * advance + (advance - block_w) * 0.5;
            let x0 = gx.round() as i32;
            let x1 = (gx + block_w).round() as i32;
            for y in y0..y1 {
                for x in x0..x1 {
                    mask.accumulate(x, y, 1.0);
                }
            }
        }
    }
}

/// How far, in whole pixels, [`stroke_mask`] can spread coverage past the
/// glyph edge.
pub fn stroke_reach(stroke_width: f32) -> u32 {
    if stroke_width <= 0.0 {
        return 0;
    }
    (stroke_width * 0.5 + 0.5).ceil() as u32
}

/// Grow `fill` by half the stroke width on every side, the way a centered
/// canvas stroke spills outside the glyph outline. The circular kernel gives
/// round joins; its rim is anti-aliased by distance.
pub fn stroke_mask(fill: &CoverageMask, stroke_width: f32) -> CoverageMask {
    let radius = stroke_width * 0.5;
    let w = fill.width as usize;
    let h = fill.height as usize;
    if w == 0 || h == 0 || radius <= 0.0 {
        return fill.clone();
    }

    let Some((row0, row1)) = fill.occupied_rows() else {
        return CoverageMask::new(fill.width, fill.height);
    };

    let reach = stroke_reach(stroke_width) as i32;
    let mut kernel: Vec<(i32, i32, f32)> = Vec::new();
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let dist = ((dx * dx + dy * dy) as f32).sqrt();
            let weight = (radius + 0.5 - dist).clamp(0.0, 1.0);
            if weight > 0.0 {
                kernel.push((dx, dy, weight));
            }
        }
    }

    let y_lo = row0.saturating_sub(reach as usize);
    let y_hi = (row1 + reach as usize).min(h - 1);
    let src = fill.as_slice();
    let mut out = CoverageMask::new(fill.width, fill.height);

    out.data[y_lo * w..(y_hi + 1) * w]
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(i, row_out)| {
            let y = (y_lo + i) as i32;
            for (x, slot) in row_out.iter_mut().enumerate() {
                let mut best = 0.0f32;
                for &(dx, dy, weight) in &kernel {
                    let sx = x as i32 + dx;
                    let sy = y + dy;
                    if sx < 0 || sy < 0 || sx >= w as i32 || sy >= h as i32 {
                        continue;
                    }
                    let c = src[sy as usize * w + sx as usize] * weight;
                    if c > best {
                        best = c;
                        if best >= 1.0 {
                            break;
                        }
                    }
                }
                *slot = best;
            }
        });

    out
}

/// Enumerate system font families (family names only, no weight variants).
/// Returns a sorted, deduplicated list of font family names.
pub fn enumerate_system_fonts() -> Vec<String> {
    match font_kit::source::SystemSource::new().all_families() {
        Ok(mut families) => {
            families.sort();
            families.dedup();
            families
        }
        Err(_) => Vec::new(),
    }
}

/// Load a font by family name and CSS weight (400 regular, 700 bold) from the system.
pub fn load_system_font(family: &str, weight: u16) -> CompositorResult<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight(weight as f32);

    let handle = SystemSource::new()
        .select_best_match(&[FamilyName::Title(family.to_string())], &props)
        .map_err(|e| CompositorError::font(format!("'{}' not found: {}", family, e)))?;

    let font_data = handle
        .load()
        .map_err(|e| CompositorError::font(format!("'{}' failed to load: {}", family, e)))?;
    let bytes = font_data
        .copy_font_data()
        .ok_or_else(|| CompositorError::font(format!("'{}' has no font data", family)))?;
    FontArc::try_from_vec((*bytes).clone())
        .map_err(|e| CompositorError::font(format!("'{}' is not a usable font: {}", family, e)))
}

/// Load the bold display face, preferring `family` and falling back through
/// [`DISPLAY_FACE_CANDIDATES`].
pub fn load_display_font(family: Option<&str>) -> CompositorResult<FontArc> {
    let candidates = family
        .into_iter()
        .chain(DISPLAY_FACE_CANDIDATES.iter().copied());

    for name in candidates {
        match load_system_font(name, 700) {
            Ok(font) => {
                log_info!("Display font: {}", name);
                return Ok(font);
            }
            Err(e) => {
                log_warn!("{}", e);
            }
        }
    }

    Err(CompositorError::font(
        "no bold display face found on this system; pass a font file instead",
    ))
}

/// Load a TrueType/OpenType file from disk.
pub fn load_font_file(path: &Path) -> CompositorResult<FontArc> {
    let bytes = std::fs::read(path)?;
    FontArc::try_from_vec(bytes)
        .map_err(|e| CompositorError::font(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_reads_a_window_and_zero_fills_outside() {
        let mut mask = CoverageMask::new(6, 4);
        mask.accumulate(3, 2, 0.75);
        mask.accumulate(5, 3, 1.0);

        let window = mask.crop(2, 1, 4, 4);
        assert_eq!((window.width(), window.height()), (4, 4));
        assert_eq!(window.get(1, 1), 0.75);
        assert_eq!(window.get(3, 2), 1.0);
        assert_eq!(window.get(3, 3), 0.0);
    }

    #[test]
    fn stroke_reach_covers_the_antialiased_rim() {
        assert_eq!(stroke_reach(0.0), 0);
        assert_eq!(stroke_reach(2.0), 2);
        assert_eq!(stroke_reach(40.0 / 15.0), 2);
        assert_eq!(stroke_reach(6.0), 4);
    }

    #[test]
    fn block_measure_is_linear_in_length() {
        let r = BlockRasterizer;
        assert_eq!(r.measure("", 40.0), 0.0);
        assert_eq!(r.measure("AB", 40.0), 48.0);
        assert_eq!(r.measure("ABCD", 20.0), 48.0);
    }

    #[test]
    fn block_glyphs_sit_on_the_baseline() {
        let mut mask = CoverageMask::new(100, 100);
        BlockRasterizer.rasterize("A", 40.0, 50.0, 60.0, &mut mask);
        // Block is 20px wide centered on x=50, from y=32 up to the baseline.
        assert_eq!(mask.get(50, 59), 1.0);
        assert_eq!(mask.get(50, 32), 1.0);
        assert_eq!(mask.get(50, 60), 0.0);
        assert_eq!(mask.get(50, 31), 0.0);
        assert_eq!(mask.get(40, 45), 1.0);
        assert_eq!(mask.get(60, 45), 0.0);
    }

    #[test]
    fn whitespace_draws_nothing() {
        let mut mask = CoverageMask::new(64, 64);
        BlockRasterizer.rasterize("   ", 20.0, 32.0, 40.0, &mut mask);
        assert!(mask.is_blank());
    }

    #[test]
    fn accumulate_clips_and_keeps_max() {
        let mut mask = CoverageMask::new(4, 4);
        mask.accumulate(-1, 0, 1.0);
        mask.accumulate(4, 0, 1.0);
        mask.accumulate(1, 1, 0.7);
        mask.accumulate(1, 1, 0.3);
        assert_eq!(mask.get(1, 1), 0.7);
        assert_eq!(mask.as_slice().iter().filter(|&&c| c > 0.0).count(), 1);
    }

    #[test]
    fn stroke_spreads_around_fill() {
        let mut fill = CoverageMask::new(21, 21);
        fill.accumulate(10, 10, 1.0);
        let stroke = stroke_mask(&fill, 4.0);
        assert_eq!(stroke.get(10, 10), 1.0);
        assert_eq!(stroke.get(11, 10), 1.0);
        assert_eq!(stroke.get(11, 11), 1.0);
        // Rim at exactly the radius is half covered.
        assert_eq!(stroke.get(12, 10), 0.5);
        assert_eq!(stroke.get(10, 8), 0.5);
        assert_eq!(stroke.get(13, 10), 0.0);
        // Diagonal (2, 2) lies outside the radius: round, not square.
        assert_eq!(stroke.get(12, 12), 0.0);
    }

    #[test]
    fn stroke_of_blank_mask_is_blank() {
        let fill = CoverageMask::new(8, 8);
        assert!(stroke_mask(&fill, 3.0).is_blank());
    }
}
