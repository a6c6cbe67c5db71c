use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::error::{CompositorError, CompositorResult};
use crate::ops::text::{stroke_mask, stroke_reach, CoverageMask, GlyphRasterizer};

/// Caption outline color. Not user-configurable.
pub const STROKE_COLOR: [u8; 4] = [0, 0, 0, 255];

/// Outline width as a fraction of the font size.
pub const STROKE_WIDTH_RATIO: f32 = 1.0 / 15.0;

/// Glyph ascent estimate used by hit-testing, in ems above the baseline.
const HIT_ASCENT_EM: f32 = 1.0;

/// Glyph descent estimate used by hit-testing, in ems below the baseline.
const HIT_DESCENT_EM: f32 = 0.2;

// ============================================================================
// OVERLAY SLOTS & ANCHORS
// ============================================================================

/// One of the two fixed caption slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OverlaySlot {
    Top,
    Bottom,
}

impl OverlaySlot {
    /// Hit-test and paint order. Top wins ties.
    pub const ALL: [OverlaySlot; 2] = [OverlaySlot::Top, OverlaySlot::Bottom];

    pub fn label(&self) -> &'static str {
        match self {
            OverlaySlot::Top => "top",
            OverlaySlot::Bottom => "bottom",
        }
    }
}

impl std::str::FromStr for OverlaySlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" | "t" => Ok(OverlaySlot::Top),
            "bottom" | "b" => Ok(OverlaySlot::Bottom),
            other => Err(format!("unknown overlay '{}', expected top or bottom", other)),
        }
    }
}

/// Text baseline position as fractions of the canvas width and height.
/// Unbounded: a caption may be dragged fully off the surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchor {
    pub rx: f32,
    pub ry: f32,
}

impl Anchor {
    pub fn new(rx: f32, ry: f32) -> Self {
        Self { rx, ry }
    }

    pub fn to_pixels(&self, surface: CanvasSurface) -> (f32, f32) {
        (
            self.rx * surface.width as f32,
            self.ry * surface.height as f32,
        )
    }

    /// Shift by a pixel delta measured on `surface`.
    pub fn nudge(&mut self, dx: f32, dy: f32, surface: CanvasSurface) {
        self.rx += dx / surface.width as f32;
        self.ry += dy / surface.height as f32;
    }
}

/// Anchor placement for both captions. `Uninitialized` until the first render
/// after a base image is set, which places the defaults.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum AnchorState {
    #[default]
    Uninitialized,
    Placed { top: Anchor, bottom: Anchor },
}

impl AnchorState {
    /// Top sits 1.2em below the upper edge, Bottom 0.4em above the lower one.
    pub fn defaults(surface: CanvasSurface, font_size: f32) -> Self {
        let h = surface.height as f32;
        AnchorState::Placed {
            top: Anchor::new(0.5, (font_size * 1.2) / h),
            bottom: Anchor::new(0.5, (h - font_size * 0.4) / h),
        }
    }

    pub fn is_placed(&self) -> bool {
        matches!(self, AnchorState::Placed { .. })
    }

    pub fn get(&self, slot: OverlaySlot) -> Option<Anchor> {
        match (self, slot) {
            (AnchorState::Uninitialized, _) => None,
            (AnchorState::Placed { top, .. }, OverlaySlot::Top) => Some(*top),
            (AnchorState::Placed { bottom, .. }, OverlaySlot::Bottom) => Some(*bottom),
        }
    }

    pub fn get_mut(&mut self, slot: OverlaySlot) -> Option<&mut Anchor> {
        match (self, slot) {
            (AnchorState::Uninitialized, _) => None,
            (AnchorState::Placed { top, .. }, OverlaySlot::Top) => Some(top),
            (AnchorState::Placed { bottom, .. }, OverlaySlot::Bottom) => Some(bottom),
        }
    }

    /// Place the defaults if nothing is placed yet. Returns true when it did.
    pub fn ensure_placed(&mut self, surface: CanvasSurface, font_size: f32) -> bool {
        if self.is_placed() {
            return false;
        }
        *self = Self::defaults(surface, font_size);
        true
    }
}

// ============================================================================
// SURFACE
// ============================================================================

/// Pixel dimensions of the drawing surface for the current render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasSurface {
    pub width: u32,
    pub height: u32,
}

impl CanvasSurface {
    /// Size the surface for an image inside a container `width_hint` pixels wide.
    ///
    /// The scale is `min(hint / image_w, hint / image_h)`, i.e. the image is
    /// fitted into a `hint × hint` square. Non-square images therefore end up
    /// narrower than the hint.
    pub fn fit(image_w: u32, image_h: u32, width_hint: u32) -> CompositorResult<Self> {
        let hint = width_hint as f64;
        let scale = if image_w == 0 || image_h == 0 {
            0.0
        } else {
            (hint / image_w as f64).min(hint / image_h as f64)
        };
        let width = (image_w as f64 * scale) as u32;
        let height = (image_h as f64 * scale) as u32;
        if width == 0 || height == 0 {
            return Err(CompositorError::DegenerateSurface { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// On-screen box of the displayed surface, in client coordinates. The element
/// may be CSS-scaled relative to the surface's pixel size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    /// Map a client-space pointer position into surface pixels.
    pub fn to_surface(&self, client_x: f32, client_y: f32, surface: CanvasSurface) -> (f32, f32) {
        let sx = if self.width > 0.0 {
            surface.width as f32 / self.width
        } else {
            1.0
        };
        let sy = if self.height > 0.0 {
            surface.height as f32 / self.height
        } else {
            1.0
        };
        ((client_x - self.left) * sx, (client_y - self.top) * sy)
    }
}

// ============================================================================
// TEXT STATE
// ============================================================================

/// Style shared by both captions.
#[derive(Clone, Debug, PartialEq)]
pub struct TextStyle {
    /// Font size in whole CSS pixels.
    pub font_size: u32,
    pub color: [u8; 4],
}

impl TextStyle {
    pub fn font_px(&self) -> f32 {
        self.font_size as f32
    }

    pub fn stroke_width(&self) -> f32 {
        self.font_px() * STROKE_WIDTH_RATIO
    }
}

/// Caption content for both slots. Empty strings are not drawn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverlayText {
    pub top: String,
    pub bottom: String,
}

impl OverlayText {
    pub fn get(&self, slot: OverlaySlot) -> &str {
        match slot {
            OverlaySlot::Top => &self.top,
            OverlaySlot::Bottom => &self.bottom,
        }
    }

    pub fn set(&mut self, slot: OverlaySlot, text: impl Into<String>) {
        match slot {
            OverlaySlot::Top => self.top = text.into(),
            OverlaySlot::Bottom => self.bottom = text.into(),
        }
    }

    /// Text as painted (uppercased), or `None` for an empty slot.
    pub fn display_text(&self, slot: OverlaySlot) -> Option<String> {
        let content = self.get(slot);
        if content.is_empty() {
            None
        } else {
            Some(content.to_uppercase())
        }
    }
}

// ============================================================================
// HIT-TESTING
// ============================================================================

/// Axis-aligned caption box in surface pixels. Edges are inclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextBounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl TextBounds {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

/// Hit box for one caption, or `None` if it is empty or not yet anchored.
pub fn overlay_bounds(
    rasterizer: &dyn GlyphRasterizer,
    text: &OverlayText,
    anchors: &AnchorState,
    style: &TextStyle,
    surface: CanvasSurface,
    slot: OverlaySlot,
) -> Option<TextBounds> {
    let display = text.display_text(slot)?;
    let anchor = anchors.get(slot)?;
    let (ax, ay) = anchor.to_pixels(surface);
    let fs = style.font_px();
    let half_w = rasterizer.measure(&display, fs) * 0.5;
    Some(TextBounds {
        left: ax - half_w,
        top: ay - fs * HIT_ASCENT_EM,
        right: ax + half_w,
        bottom: ay + fs * HIT_DESCENT_EM,
    })
}

/// First caption under the pointer, testing Top before Bottom.
pub fn hit_test(
    rasterizer: &dyn GlyphRasterizer,
    text: &OverlayText,
    anchors: &AnchorState,
    style: &TextStyle,
    surface: CanvasSurface,
    x: f32,
    y: f32,
) -> Option<OverlaySlot> {
    OverlaySlot::ALL.into_iter().find(|&slot| {
        overlay_bounds(rasterizer, text, anchors, style, surface, slot)
            .is_some_and(|b| b.contains(x, y))
    })
}

// ============================================================================
// COMPOSITING
// ============================================================================

/// Stretch the base image to exactly fill the surface.
pub fn scale_base(image: &RgbaImage, surface: CanvasSurface) -> RgbaImage {
    if image.dimensions() == surface.dimensions() {
        return image.clone();
    }
    image::imageops::resize(
        image,
        surface.width,
        surface.height,
        image::imageops::FilterType::Triangle,
    )
}

/// Paint both captions over a copy of the already-scaled base image.
/// For each caption the black outline goes down first, then the fill.
pub fn compose(
    base: &RgbaImage,
    text: &OverlayText,
    anchors: &AnchorState,
    style: &TextStyle,
    rasterizer: &dyn GlyphRasterizer,
) -> RgbaImage {
    let mut frame = base.clone();
    let surface = CanvasSurface {
        width: frame.width(),
        height: frame.height(),
    };
    let fs = style.font_px();

    for slot in OverlaySlot::ALL {
        let Some(display) = text.display_text(slot) else { continue };
        let Some(anchor) = anchors.get(slot) else { continue };
        let (ax, ay) = anchor.to_pixels(surface);

        // Glyphs just past an edge still stroke into the surface.
        let pad = stroke_reach(style.stroke_width());
        let mut fill = CoverageMask::new(surface.width + 2 * pad, surface.height + 2 * pad);
        rasterizer.rasterize(&display, fs, ax + pad as f32, ay + pad as f32, &mut fill);
        if fill.is_blank() {
            continue;
        }

        let stroke = stroke_mask(&fill, style.stroke_width());
        let stroke = stroke.crop(pad, pad, surface.width, surface.height);
        let fill = fill.crop(pad, pad, surface.width, surface.height);
        paint_coverage(&mut frame, &stroke, STROKE_COLOR);
        paint_coverage(&mut frame, &fill, style.color);
    }

    frame
}

/// Source-over `color` onto `frame`, weighted per pixel by `mask`.
pub fn paint_coverage(frame: &mut RgbaImage, mask: &CoverageMask, color: [u8; 4]) {
    let w = frame.width() as usize;
    if w == 0 || mask.width() != frame.width() || mask.height() != frame.height() {
        return;
    }
    let coverage = mask.as_slice();
    let raw: &mut [u8] = frame;

    raw.par_chunks_mut(w * 4)
        .zip(coverage.par_chunks(w))
        .for_each(|(row, cov_row)| {
            for (x, &cov) in cov_row.iter().enumerate() {
                if cov <= 0.0 {
                    continue;
                }
                let pi = x * 4;
                let base = Rgba([row[pi], row[pi + 1], row[pi + 2], row[pi + 3]]);
                let out = blend_pixel(base, color, cov);
                row[pi..pi + 4].copy_from_slice(&out.0);
            }
        });
}

/// Normal-mode straight-alpha blend of `top` at `coverage` over `base`.
fn blend_pixel(base: Rgba<u8>, top: [u8; 4], coverage: f32) -> Rgba<u8> {
    let top_a = (top[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);

    // Fast path: nothing to blend
    if top_a <= 0.0 {
        return base;
    }
    // Opaque source overwrites
    if top_a >= 1.0 {
        return Rgba(top);
    }

    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |t: u8, b: u8| {
        let v = (t as f32 * top_a + b as f32 * base_a * (1.0 - top_a)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(top[0], base[0]),
        channel(top[1], base[1]),
        channel(top[2], base[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
