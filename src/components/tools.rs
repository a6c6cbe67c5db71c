use crate::canvas::OverlaySlot;

/// Pointer input in surface pixel space. Mouse and touch both map onto this.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
    /// Pointer left the surface.
    Leave,
    /// Touch cancelled by the platform.
    Cancel,
}

/// Cursor affordance shown over the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CursorHint {
    #[default]
    Default,
    /// Hovering a caption that can be picked up.
    Grab,
    /// A caption is being dragged.
    Grabbing,
}

/// One relative drag step to apply to `target`'s anchor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragStep {
    pub target: OverlaySlot,
    pub dx: f32,
    pub dy: f32,
}

/// What the state machine decided for one event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragOutcome {
    pub step: Option<DragStep>,
    pub cursor: CursorHint,
}

impl DragOutcome {
    fn cursor(cursor: CursorHint) -> Self {
        Self { step: None, cursor }
    }
}

/// Caption drag state. Only one caption can be held at a time.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum DragSession {
    #[default]
    Idle,
    Dragging {
        target: OverlaySlot,
        /// Reference point; each move is measured from here.
        last_x: f32,
        last_y: f32,
    },
}

impl DragSession {
    pub fn is_dragging(&self) -> bool {
        matches!(self, DragSession::Dragging { .. })
    }

    pub fn target(&self) -> Option<OverlaySlot> {
        match self {
            DragSession::Idle => None,
            DragSession::Dragging { target, .. } => Some(*target),
        }
    }

    /// Advance the machine by one event. `hit` answers which caption (if any)
    /// lies under a surface point, Top taking priority.
    pub fn handle<F>(&mut self, event: PointerEvent, hit: F) -> DragOutcome
    where
        F: Fn(f32, f32) -> Option<OverlaySlot>,
    {
        match (*self, event) {
            (DragSession::Idle, PointerEvent::Down { x, y }) => match hit(x, y) {
                Some(target) => {
                    *self = DragSession::Dragging {
                        target,
                        last_x: x,
                        last_y: y,
                    };
                    DragOutcome::cursor(CursorHint::Grabbing)
                }
                None => DragOutcome::cursor(CursorHint::Default),
            },
            (DragSession::Idle, PointerEvent::Move { x, y }) => {
                if hit(x, y).is_some() {
                    DragOutcome::cursor(CursorHint::Grab)
                } else {
                    DragOutcome::cursor(CursorHint::Default)
                }
            }
            (DragSession::Idle, _) => DragOutcome::cursor(CursorHint::Default),
            (
                DragSession::Dragging {
                    target,
                    last_x,
                    last_y,
                },
                PointerEvent::Move { x, y },
            ) => {
                *self = DragSession::Dragging {
                    target,
                    last_x: x,
                    last_y: y,
                };
                DragOutcome {
                    step: Some(DragStep {
                        target,
                        dx: x - last_x,
                        dy: y - last_y,
                    }),
                    cursor: CursorHint::Grabbing,
                }
            }
            // A second press while holding a caption changes nothing.
            (DragSession::Dragging { .. }, PointerEvent::Down { .. }) => {
                DragOutcome::cursor(CursorHint::Grabbing)
            }
            (
                DragSession::Dragging { .. },
                PointerEvent::Up | PointerEvent::Leave | PointerEvent::Cancel,
            ) => {
                *self = DragSession::Idle;
                DragOutcome::cursor(CursorHint::Default)
            }
        }
    }
}
