//! MemeFE: caption compositing core.
//!
//! A [`session::CompositorSession`] owns a base image and two captions (Top
//! and Bottom), renders them as outlined uppercase text at the container's
//! display resolution, lets pointer events drag either caption around, and
//! exports the result as PNG.

#[macro_use]
pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod ops;
pub mod session;
pub mod settings;

pub use canvas::{Anchor, AnchorState, CanvasSurface, DisplayRect, OverlaySlot};
pub use components::tools::{CursorHint, DragSession, PointerEvent};
pub use error::{CompositorError, CompositorResult};
pub use ops::text::{BlockRasterizer, FontRasterizer, GlyphRasterizer};
pub use session::{CompositorSession, OverlaySnapshot};
pub use settings::MemeSettings;
