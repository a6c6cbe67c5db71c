use image::RgbaImage;
use uuid::Uuid;

use crate::canvas::{
    self, Anchor, AnchorState, CanvasSurface, OverlaySlot, OverlayText, TextStyle,
};
use crate::components::tools::{CursorHint, DragSession, PointerEvent};
use crate::error::{CompositorError, CompositorResult};
use crate::io::{self, PendingImage};
use crate::ops::color::{parse_hex_color, to_hex};
use crate::ops::text::GlyphRasterizer;
use crate::settings::MemeSettings;

/// Fallback caption color when the configured one does not parse.
const FALLBACK_COLOR: [u8; 4] = [255, 255, 255, 255];

/// The active base image and the identifier its provider gave it.
struct BaseImage {
    id: String,
    pixels: RgbaImage,
}

/// Caption state as seen from outside, e.g. by a remix flow.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlaySnapshot {
    pub top: String,
    pub bottom: String,
    pub top_anchor: Option<Anchor>,
    pub bottom_anchor: Option<Anchor>,
    pub font_size: u32,
    pub color_hex: String,
}

/// One user's meme in progress: base image, captions, anchors, drag state and
/// the last rendered frame. Sessions share nothing with each other.
pub struct CompositorSession {
    pub id: Uuid,
    rasterizer: Box<dyn GlyphRasterizer>,
    image: Option<BaseImage>,
    pending: Option<PendingImage>,
    text: OverlayText,
    style: TextStyle,
    color_hex: String,
    anchors: AnchorState,
    drag: DragSession,
    cursor: CursorHint,
    container_width: u32,
    /// Surface of the last successful render; pointer coordinates refer to it.
    surface: Option<CanvasSurface>,
    /// Base image already stretched to `surface`.
    scaled_base: Option<RgbaImage>,
    frame: Option<RgbaImage>,
    /// Style restored by `reset`.
    default_font_size: u32,
    default_color_hex: String,
}

impl CompositorSession {
    pub fn new(rasterizer: Box<dyn GlyphRasterizer>, settings: &MemeSettings) -> Self {
        let (color, color_hex) = match parse_hex_color(&settings.text_color) {
            Ok(rgba) => (rgba, settings.text_color.clone()),
            Err(e) => {
                log_warn!("{}; using white", e);
                (FALLBACK_COLOR, to_hex(FALLBACK_COLOR))
            }
        };
        let font_size = settings.font_size.max(1);

        Self {
            id: Uuid::new_v4(),
            rasterizer,
            image: None,
            pending: None,
            text: OverlayText::default(),
            style: TextStyle { font_size, color },
            color_hex: color_hex.clone(),
            anchors: AnchorState::Uninitialized,
            drag: DragSession::Idle,
            cursor: CursorHint::Default,
            container_width: settings.container_width,
            surface: None,
            scaled_base: None,
            frame: None,
            default_font_size: font_size,
            default_color_hex: color_hex,
        }
    }

    // ------------------------------------------------------------------
    // Base image
    // ------------------------------------------------------------------

    /// Replace the base image. Anchors go back to the defaults, any drag in
    /// progress is dropped and a pending background decode is discarded.
    pub fn set_base_image(&mut self, id: impl Into<String>, pixels: RgbaImage) {
        let id = id.into();
        log_info!(
            "[{}] base image '{}' ({}x{})",
            self.id,
            id,
            pixels.width(),
            pixels.height()
        );
        self.image = Some(BaseImage { id, pixels });
        self.pending = None;
        self.anchors = AnchorState::Uninitialized;
        self.drag = DragSession::Idle;
        self.cursor = CursorHint::Default;
        self.surface = None;
        self.scaled_base = None;
        self.frame = None;
        self.refresh();
    }

    /// Decode `bytes` on the calling thread and make them the base image.
    pub fn load_image_bytes(&mut self, id: impl Into<String>, bytes: &[u8]) -> CompositorResult<()> {
        let pixels = io::decode_image(bytes)?;
        self.set_base_image(id, pixels);
        Ok(())
    }

    /// Start decoding in the background. A newer call supersedes an older one.
    pub fn begin_load(&mut self, id: impl Into<String>, bytes: Vec<u8>) {
        self.pending = Some(PendingImage::spawn(id, bytes));
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Apply a finished background decode. `None` while nothing has finished.
    pub fn poll_load(&mut self) -> Option<CompositorResult<()>> {
        let result = self.pending.as_ref()?.try_take()?;
        let pending = self.pending.take()?;
        Some(self.apply_load(pending.id, result))
    }

    /// Block until the pending decode finishes and apply it.
    pub fn finish_load(&mut self) -> CompositorResult<()> {
        let pending = self.pending.take().ok_or(CompositorError::LoadAbandoned)?;
        let id = pending.id.clone();
        let result = pending.wait();
        self.apply_load(id, result)
    }

    fn apply_load(&mut self, id: String, result: CompositorResult<RgbaImage>) -> CompositorResult<()> {
        match result {
            Ok(pixels) => {
                self.set_base_image(id, pixels);
                Ok(())
            }
            Err(e) => {
                log_err!("[{}] decoding '{}' failed: {}", self.id, id, e);
                Err(e)
            }
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn image_id(&self) -> Option<&str> {
        self.image.as_ref().map(|b| b.id.as_str())
    }

    // ------------------------------------------------------------------
    // Text and style
    // ------------------------------------------------------------------

    pub fn set_overlay_text(&mut self, slot: OverlaySlot, text: impl Into<String>) {
        self.text.set(slot, text);
        self.refresh();
    }

    /// Set both captions at once, as a caption provider delivers them.
    pub fn set_captions(&mut self, top: impl Into<String>, bottom: impl Into<String>) {
        self.text.set(OverlaySlot::Top, top);
        self.text.set(OverlaySlot::Bottom, bottom);
        self.refresh();
    }

    pub fn overlay_text(&self, slot: OverlaySlot) -> &str {
        self.text.get(slot)
    }

    /// Font size in pixels (minimum 1). Anchors stay where they are.
    pub fn set_font_size(&mut self, px: u32) {
        self.style.font_size = px.max(1);
        self.refresh();
    }

    pub fn font_size(&self) -> u32 {
        self.style.font_size
    }

    /// Caption fill color from a hex string. An invalid value leaves the
    /// current color in place.
    pub fn set_text_color(&mut self, hex: &str) -> CompositorResult<()> {
        self.style.color = parse_hex_color(hex)?;
        self.color_hex = hex.trim().to_string();
        self.refresh();
        Ok(())
    }

    pub fn text_color(&self) -> [u8; 4] {
        self.style.color
    }

    /// Container width the surface is fitted into. Anchors are kept.
    pub fn set_container_width(&mut self, px: u32) {
        self.container_width = px;
        self.refresh();
    }

    // ------------------------------------------------------------------
    // Anchors
    // ------------------------------------------------------------------

    pub fn anchor(&self, slot: OverlaySlot) -> Option<Anchor> {
        self.anchors.get(slot)
    }

    /// Anchor position in pixels on the current surface.
    pub fn anchor_px(&self, slot: OverlaySlot) -> Option<(f32, f32)> {
        let surface = self.surface?;
        Some(self.anchors.get(slot)?.to_pixels(surface))
    }

    /// Move a caption directly. Returns false while anchors are not placed
    /// yet (no base image rendered since the last image change).
    pub fn set_anchor(&mut self, slot: OverlaySlot, anchor: Anchor) -> bool {
        let Some(current) = self.anchors.get_mut(slot) else {
            return false;
        };
        *current = anchor;
        self.refresh();
        true
    }

    // ------------------------------------------------------------------
    // Pointer interaction
    // ------------------------------------------------------------------

    pub fn is_pointer_over_overlay(&self, x: f32, y: f32, slot: OverlaySlot) -> bool {
        let Some(surface) = self.surface else {
            return false;
        };
        canvas::overlay_bounds(
            self.rasterizer.as_ref(),
            &self.text,
            &self.anchors,
            &self.style,
            surface,
            slot,
        )
        .is_some_and(|b| b.contains(x, y))
    }

    /// Feed one pointer event (surface pixels) through the drag machine.
    /// Returns the cursor hint to show.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> CursorHint {
        let rasterizer = self.rasterizer.as_ref();
        let text = &self.text;
        let anchors = &self.anchors;
        let style = &self.style;
        let surface = self.surface;

        let outcome = self.drag.handle(event, |x, y| {
            surface.and_then(|s| canvas::hit_test(rasterizer, text, anchors, style, s, x, y))
        });

        if let Some(step) = outcome.step
            && let Some(surface) = self.surface
            && let Some(anchor) = self.anchors.get_mut(step.target)
        {
            anchor.nudge(step.dx, step.dy, surface);
            self.refresh();
        }

        self.cursor = outcome.cursor;
        outcome.cursor
    }

    pub fn cursor(&self) -> CursorHint {
        self.cursor
    }

    pub fn drag_target(&self) -> Option<OverlaySlot> {
        self.drag.target()
    }

    // ------------------------------------------------------------------
    // Rendering and export
    // ------------------------------------------------------------------

    /// Recompute the surface and draw a fresh frame. On error nothing changes.
    pub fn render(&mut self) -> CompositorResult<&RgbaImage> {
        let Some(base) = self.image.as_ref() else {
            return Err(CompositorError::NoImageLoaded);
        };
        let surface =
            CanvasSurface::fit(base.pixels.width(), base.pixels.height(), self.container_width)?;

        if self.anchors.ensure_placed(surface, self.style.font_px()) {
            log_info!("[{}] anchors placed for {}x{}", self.id, surface.width, surface.height);
        }

        let scaled = match self.scaled_base.take() {
            Some(img) if img.dimensions() == surface.dimensions() => img,
            _ => canvas::scale_base(&base.pixels, surface),
        };
        let frame = canvas::compose(
            &scaled,
            &self.text,
            &self.anchors,
            &self.style,
            self.rasterizer.as_ref(),
        );

        self.scaled_base = Some(scaled);
        self.surface = Some(surface);
        Ok(&*self.frame.insert(frame))
    }

    /// Re-render after a state change, absorbing the expected failures.
    fn refresh(&mut self) {
        let result = self.render().map(|_| ());
        match result {
            Ok(()) | Err(CompositorError::NoImageLoaded) => {}
            Err(e) => {
                log_warn!("[{}] render skipped: {}", self.id, e);
            }
        }
    }

    /// Last rendered frame, if any.
    pub fn frame(&self) -> Option<&RgbaImage> {
        self.frame.as_ref()
    }

    pub fn surface(&self) -> Option<CanvasSurface> {
        self.surface
    }

    /// The current frame, exactly as displayed.
    pub fn export_frame(&self) -> CompositorResult<&RgbaImage> {
        if self.image.is_none() {
            return Err(CompositorError::NoImageLoaded);
        }
        self.frame.as_ref().ok_or(CompositorError::DegenerateSurface {
            width: 0,
            height: 0,
        })
    }

    /// PNG of the current frame at the surface's pixel size (not the source
    /// image's native resolution).
    pub fn export_png(&self) -> CompositorResult<Vec<u8>> {
        let frame = self.export_frame()?;
        let bytes = io::encode_png(frame)?;
        log_info!(
            "[{}] exported {}x{} PNG ({} bytes)",
            self.id,
            frame.width(),
            frame.height(),
            bytes.len()
        );
        Ok(bytes)
    }

    // ------------------------------------------------------------------
    // Snapshot and reset
    // ------------------------------------------------------------------

    pub fn overlay_snapshot(&self) -> OverlaySnapshot {
        OverlaySnapshot {
            top: self.text.top.clone(),
            bottom: self.text.bottom.clone(),
            top_anchor: self.anchors.get(OverlaySlot::Top),
            bottom_anchor: self.anchors.get(OverlaySlot::Bottom),
            font_size: self.style.font_size,
            color_hex: self.color_hex.clone(),
        }
    }

    /// Back to the empty state: no image, no text, default font size and color.
    pub fn reset(&mut self) {
        log_info!("[{}] reset", self.id);
        self.image = None;
        self.pending = None;
        self.text = OverlayText::default();
        self.style.font_size = self.default_font_size;
        self.style.color = parse_hex_color(&self.default_color_hex).unwrap_or(FALLBACK_COLOR);
        self.color_hex = self.default_color_hex.clone();
        self.anchors = AnchorState::Uninitialized;
        self.drag = DragSession::Idle;
        self.cursor = CursorHint::Default;
        self.surface = None;
        self.scaled_base = None;
        self.frame = None;
    }
}
