//! Error types for the compositor session and its I/O helpers.

/// Everything the compositor can report back to its caller.
///
/// None of these are fatal: the session keeps its prior state whenever an
/// operation returns one of them.
#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    #[error("no base image is loaded")]
    NoImageLoaded,

    #[error("surface is degenerate ({width}x{height})")]
    DegenerateSurface { width: u32, height: u32 },

    #[error("invalid color {value:?}: expected #rgb, #rrggbb or #rrggbbaa")]
    InvalidColor { value: String },

    #[error("font error: {message}")]
    Font { message: String },

    #[error("image load was abandoned before it completed")]
    LoadAbandoned,

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias using CompositorError.
pub type CompositorResult<T> = Result<T, CompositorError>;

impl CompositorError {
    pub fn font(msg: impl Into<String>) -> Self {
        Self::Font {
            message: msg.into(),
        }
    }

    pub fn invalid_color(value: impl Into<String>) -> Self {
        Self::InvalidColor {
            value: value.into(),
        }
    }

    /// True for the conditions a UI would answer with a prompt rather than an
    /// error dialog (nothing loaded yet, container collapsed).
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::NoImageLoaded | Self::DegenerateSurface { .. })
    }
}
