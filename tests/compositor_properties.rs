use std::time::Duration;

use image::{Rgba, RgbaImage};
use memefe::{
    Anchor, AnchorState, BlockRasterizer, CanvasSurface, CompositorError, CompositorSession,
    CursorHint, DisplayRect, MemeSettings, OverlaySlot, PointerEvent,
};

const GRAY: Rgba<u8> = Rgba([90, 90, 90, 255]);

fn session(width: u32) -> CompositorSession {
    let settings = MemeSettings {
        container_width: width,
        font_size: 40,
        text_color: "#ffffff".to_string(),
        ..MemeSettings::default()
    };
    CompositorSession::new(Box::new(BlockRasterizer), &settings)
}

fn gray(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_pixel(w, h, GRAY)
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

/// 400x400 surface with "hello" on top, anchored at (0.5, 0.1) → (200, 40).
fn captioned() -> CompositorSession {
    let mut s = session(400);
    s.set_base_image("square", gray(400, 400));
    s.set_captions("hello", "world");
    assert!(s.set_anchor(OverlaySlot::Top, Anchor::new(0.5, 0.1)));
    s
}

#[test]
fn rerender_is_pixel_identical() {
    let mut s = captioned();
    let first = s.render().unwrap().clone();
    let second = s.render().unwrap().clone();
    assert_eq!(first, second);
}

#[test]
fn surface_keeps_image_aspect_ratio() {
    let mut s = session(400);
    s.set_base_image("wide", gray(800, 400));
    let surface = s.surface().unwrap();
    assert_eq!(surface.width as f32 / surface.height as f32, 800.0 / 400.0);
}

#[test]
fn anchors_survive_resize_as_fractions() {
    let mut s = captioned();
    let (x, y) = s.anchor_px(OverlaySlot::Top).unwrap();
    assert!(approx(x / 400.0, 0.5));
    assert!(approx(y / 400.0, 0.1));

    s.set_container_width(800);
    assert_eq!(s.surface().unwrap().dimensions(), (800, 800));
    let (x, y) = s.anchor_px(OverlaySlot::Top).unwrap();
    assert!(approx(x / 800.0, 0.5));
    assert!(approx(y / 800.0, 0.1));
    assert_eq!(s.anchor(OverlaySlot::Top), Some(Anchor::new(0.5, 0.1)));
}

#[test]
fn drag_deltas_accumulate_relative_to_last_point() {
    let mut s = captioned();
    assert_eq!(
        s.handle_pointer(PointerEvent::Down { x: 200.0, y: 30.0 }),
        CursorHint::Grabbing
    );
    assert_eq!(s.drag_target(), Some(OverlaySlot::Top));
    s.handle_pointer(PointerEvent::Move { x: 210.0, y: 30.0 });
    s.handle_pointer(PointerEvent::Move { x: 220.0, y: 30.0 });
    s.handle_pointer(PointerEvent::Up);

    let anchor = s.anchor(OverlaySlot::Top).unwrap();
    assert!(approx(anchor.rx, 0.5 + 20.0 / 400.0), "rx = {}", anchor.rx);
    assert!(approx(anchor.ry, 0.1));
    assert_eq!(s.drag_target(), None);
}

#[test]
fn drag_can_leave_the_surface() {
    let mut s = captioned();
    s.handle_pointer(PointerEvent::Down { x: 200.0, y: 30.0 });
    s.handle_pointer(PointerEvent::Move { x: 200.0, y: -770.0 });
    s.handle_pointer(PointerEvent::Leave);
    let anchor = s.anchor(OverlaySlot::Top).unwrap();
    assert!(approx(anchor.ry, 0.1 - 2.0));
    assert!(s.frame().is_some());
}

#[test]
fn hit_box_edges_are_inclusive() {
    let mut s = session(400);
    s.set_base_image("square", gray(400, 400));
    s.set_captions("ab", "");
    s.set_anchor(OverlaySlot::Top, Anchor::new(0.5, 0.5));

    // "AB" is 48px wide at 40px: box spans x 176..=224, y 160..=208.
    assert!(s.is_pointer_over_overlay(224.0, 208.0, OverlaySlot::Top));
    assert!(s.is_pointer_over_overlay(176.0, 160.0, OverlaySlot::Top));
    assert!(!s.is_pointer_over_overlay(225.0, 208.0, OverlaySlot::Top));
    assert!(!s.is_pointer_over_overlay(176.0, 159.0, OverlaySlot::Top));
    assert!(!s.is_pointer_over_overlay(200.0, 209.0, OverlaySlot::Top));
}

#[test]
fn empty_captions_are_neither_drawn_nor_hit() {
    let mut s = session(400);
    s.set_base_image("square", gray(400, 400));
    s.set_captions("", "");

    let frame = s.frame().unwrap();
    assert!(frame.pixels().all(|p| *p == GRAY));

    let (x, y) = s.anchor_px(OverlaySlot::Top).unwrap();
    assert!(!s.is_pointer_over_overlay(x, y - 5.0, OverlaySlot::Top));
    assert_eq!(
        s.handle_pointer(PointerEvent::Down { x, y: y - 5.0 }),
        CursorHint::Default
    );
    assert_eq!(s.drag_target(), None);
}

#[test]
fn new_image_resets_anchors_and_drag() {
    let mut s = captioned();
    s.handle_pointer(PointerEvent::Down { x: 200.0, y: 30.0 });
    s.handle_pointer(PointerEvent::Move { x: 260.0, y: 90.0 });
    assert_eq!(s.drag_target(), Some(OverlaySlot::Top));

    s.set_base_image("next", gray(400, 400));
    assert_eq!(s.drag_target(), None);

    let surface = CanvasSurface {
        width: 400,
        height: 400,
    };
    let defaults = AnchorState::defaults(surface, 40.0);
    assert_eq!(
        s.anchor(OverlaySlot::Top),
        defaults.get(OverlaySlot::Top)
    );
    assert_eq!(
        s.anchor(OverlaySlot::Bottom),
        defaults.get(OverlaySlot::Bottom)
    );
    // Captions are kept across images.
    assert_eq!(s.overlay_text(OverlaySlot::Top), "hello");
}

#[test]
fn export_without_image_fails() {
    let s = session(400);
    assert!(matches!(s.export_png(), Err(CompositorError::NoImageLoaded)));
}

#[test]
fn export_matches_display_resolution() {
    let mut s = session(400);
    s.set_base_image("wide", gray(800, 400));
    s.set_captions("top", "bottom");
    let png = s.export_png().unwrap();
    let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (400, 200));
    assert_eq!(&decoded, s.frame().unwrap());
}

#[test]
fn captions_are_outlined_and_filled() {
    let mut s = session(400);
    s.set_base_image("square", gray(400, 400));
    s.set_text_color("#ff0000").unwrap();
    s.set_captions("i", "");
    s.set_anchor(OverlaySlot::Top, Anchor::new(0.5, 0.5));

    // Single 20px block from x=190 to 210, y=172 to 200; outline radius ~1.33px.
    let frame = s.frame().unwrap();
    assert_eq!(frame.get_pixel(200, 190).0, [255, 0, 0, 255]);
    let rim = frame.get_pixel(189, 190).0;
    assert!(rim[0] == rim[1] && rim[1] == rim[2], "rim {:?}", rim);
    assert!(rim[0] < 30, "rim {:?}", rim);
    assert_eq!(frame.get_pixel(186, 190).0, GRAY.0);
    assert_eq!(frame.get_pixel(150, 150).0, GRAY.0);
}

#[test]
fn top_wins_when_captions_overlap() {
    let mut s = captioned();
    s.set_anchor(OverlaySlot::Bottom, Anchor::new(0.5, 0.1));
    s.handle_pointer(PointerEvent::Down { x: 200.0, y: 30.0 });
    assert_eq!(s.drag_target(), Some(OverlaySlot::Top));
}

#[test]
fn hover_sets_grab_cursor() {
    let mut s = captioned();
    assert_eq!(
        s.handle_pointer(PointerEvent::Move { x: 200.0, y: 30.0 }),
        CursorHint::Grab
    );
    assert_eq!(
        s.handle_pointer(PointerEvent::Move { x: 5.0, y: 300.0 }),
        CursorHint::Default
    );
    assert_eq!(s.cursor(), CursorHint::Default);
    assert_eq!(s.drag_target(), None);
}

#[test]
fn css_scaled_pointer_positions_map_to_surface() {
    let mut s = captioned();
    // Surface is 400px but shown at 200px, offset by (10, 10).
    let rect = DisplayRect {
        left: 10.0,
        top: 10.0,
        width: 200.0,
        height: 200.0,
    };
    let surface = s.surface().unwrap();
    let (x, y) = rect.to_surface(110.0, 25.0, surface);
    assert_eq!((x, y), (200.0, 30.0));
    s.handle_pointer(PointerEvent::Down { x, y });
    assert_eq!(s.drag_target(), Some(OverlaySlot::Top));
}

#[test]
fn background_load_applies_when_polled() {
    let mut s = session(300);
    let png = memefe::io::encode_png(&gray(600, 300)).unwrap();
    s.begin_load("tray-7", png);
    assert!(s.is_loading());

    let mut outcome = None;
    for _ in 0..500 {
        if let Some(result) = s.poll_load() {
            outcome = Some(result);
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    outcome.expect("decode finished").unwrap();
    assert!(!s.is_loading());
    assert_eq!(s.image_id(), Some("tray-7"));
    assert_eq!(s.surface().unwrap().dimensions(), (300, 150));
}

#[test]
fn failed_background_load_keeps_previous_image() {
    let mut s = captioned();
    s.begin_load("broken", b"not an image".to_vec());
    assert!(s.finish_load().is_err());
    assert_eq!(s.image_id(), Some("square"));
    assert_eq!(s.anchor(OverlaySlot::Top), Some(Anchor::new(0.5, 0.1)));
}

#[test]
fn reset_returns_to_empty_state() {
    let mut s = captioned();
    s.set_font_size(72);
    s.set_text_color("#00ff00").unwrap();
    s.reset();

    let snap = s.overlay_snapshot();
    assert!(!s.has_image());
    assert!(s.frame().is_none());
    assert_eq!(snap.top, "");
    assert_eq!(snap.bottom, "");
    assert_eq!(snap.top_anchor, None);
    assert_eq!(snap.font_size, 40);
    assert_eq!(snap.color_hex, "#ffffff");
    assert!(matches!(s.export_png(), Err(CompositorError::NoImageLoaded)));
}

#[test]
fn sessions_do_not_share_state() {
    let mut a = captioned();
    let b = session(400);
    assert_ne!(a.id, b.id);
    a.set_overlay_text(OverlaySlot::Bottom, "only in a");
    assert_eq!(b.overlay_text(OverlaySlot::Bottom), "");
    assert!(!b.has_image());
}
