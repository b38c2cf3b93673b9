//! Square selection state machine.
//!
//! Pointer gestures arrive in display coordinates; the state machine turns them into a square
//! [`SelectionBox`] in native pixels. Transitions are pure: [`transition`] takes the current state
//! and one event and returns the next state plus an optional notification for the consumer.

use crate::foundation::core::{Point, SelectionBox};
use crate::geometry::viewport::Viewport;

/// Pointer input relevant to selection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureEvent {
    /// Pointer pressed on the selection surface.
    Start(Point),
    /// Pointer moved while pressed.
    Move(Point),
    /// Pointer released.
    End,
    /// Selection abandoned (new reference image, result cleared).
    Reset,
}

/// In-progress drag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragGesture {
    /// Pointer-down position, display coordinates.
    pub anchor: Point,
    /// Preview square for the latest move, native coordinates.
    pub live_box: Option<SelectionBox>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SelectorState {
    #[default]
    Idle,
    Dragging(DragGesture),
    Committed(SelectionBox),
}

impl SelectorState {
    /// The committed box, if any. Live previews are not selections.
    pub fn committed(&self) -> Option<SelectionBox> {
        match self {
            Self::Committed(b) => Some(*b),
            Self::Idle | Self::Dragging(_) => None,
        }
    }

    /// Box to draw as an overlay: the live preview while dragging, else the committed box.
    pub fn visible_box(&self) -> Option<SelectionBox> {
        match self {
            Self::Idle => None,
            Self::Dragging(g) => g.live_box,
            Self::Committed(b) => Some(*b),
        }
    }
}

/// What the consumer is told about the selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionChange {
    /// No selection (the `null` notification).
    Cleared,
    Committed(SelectionBox),
}

impl SelectionChange {
    pub fn selection(self) -> Option<SelectionBox> {
        match self {
            Self::Cleared => None,
            Self::Committed(b) => Some(b),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub state: SelectorState,
    pub change: Option<SelectionChange>,
}

/// Commit threshold: a released square must be strictly wider than `min_size` native pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SquareRules {
    pub min_size: u32,
}

impl Default for SquareRules {
    fn default() -> Self {
        Self { min_size: 50 }
    }
}

/// Advance the selector by one event.
///
/// `viewport` must describe the current layout; it is only consulted for moves.
pub fn transition(
    state: SelectorState,
    event: GestureEvent,
    viewport: &Viewport,
    rules: SquareRules,
) -> Transition {
    match (state, event) {
        (_, GestureEvent::Start(anchor)) => Transition {
            state: SelectorState::Dragging(DragGesture {
                anchor,
                live_box: None,
            }),
            change: Some(SelectionChange::Cleared),
        },
        (SelectorState::Dragging(g), GestureEvent::Move(current)) => Transition {
            state: SelectorState::Dragging(DragGesture {
                anchor: g.anchor,
                live_box: square_from_drag(g.anchor, current, viewport),
            }),
            change: None,
        },
        (SelectorState::Dragging(g), GestureEvent::End) => match g.live_box {
            Some(b) if b.width > rules.min_size => {
                tracing::debug!(x = b.x, y = b.y, size = b.width, "selection committed");
                Transition {
                    state: SelectorState::Committed(b),
                    change: Some(SelectionChange::Committed(b)),
                }
            }
            _ => {
                tracing::debug!("selection too small, discarded");
                Transition {
                    state: SelectorState::Idle,
                    change: Some(SelectionChange::Cleared),
                }
            }
        },
        (SelectorState::Idle, GestureEvent::Reset) => Transition {
            state: SelectorState::Idle,
            change: None,
        },
        (_, GestureEvent::Reset) => Transition {
            state: SelectorState::Idle,
            change: Some(SelectionChange::Cleared),
        },
        (state @ (SelectorState::Idle | SelectorState::Committed(_)), GestureEvent::Move(_))
        | (state @ (SelectorState::Idle | SelectorState::Committed(_)), GestureEvent::End) => {
            Transition {
                state,
                change: None,
            }
        }
    }
}

/// Native-space square for a drag from `anchor` to `current`.
///
/// The square grows away from the anchor in the drag direction with side `max(|dx|, |dy|)`. Its
/// top-left is clamped to the image origin, then the side is shrunk so the square stays inside the
/// natural image. Height is always taken from the width, so non-uniform display scaling cannot
/// break squareness.
pub fn square_from_drag(anchor: Point, current: Point, viewport: &Viewport) -> Option<SelectionBox> {
    let a = viewport.to_local(anchor);
    let c = viewport.to_local(current);
    let dx = c.x - a.x;
    let dy = c.y - a.y;
    let size = dx.abs().max(dy.abs());

    let left = if dx < 0.0 { a.x - size } else { a.x }.max(0.0);
    let top = if dy < 0.0 { a.y - size } else { a.y }.max(0.0);

    let x = (left * viewport.scale_x()).floor() as u32;
    let y = (top * viewport.scale_y()).floor() as u32;
    let side = (size * viewport.scale_x()).floor() as u32;

    let (nw, nh) = viewport.natural_size();
    if x >= nw || y >= nh {
        return None;
    }
    let side = side.min(nw - x).min(nh - y);
    (side > 0).then(|| SelectionBox::square(x, y, side))
}

/// Stateful wrapper that owns the current [`SelectorState`].
#[derive(Clone, Debug, Default)]
pub struct SquareSelector {
    state: SelectorState,
    rules: SquareRules,
}

impl SquareSelector {
    pub fn new(rules: SquareRules) -> Self {
        Self {
            state: SelectorState::Idle,
            rules,
        }
    }

    pub fn state(&self) -> SelectorState {
        self.state
    }

    pub fn selection(&self) -> Option<SelectionBox> {
        self.state.committed()
    }

    pub fn handle(&mut self, event: GestureEvent, viewport: &Viewport) -> Option<SelectionChange> {
        let t = transition(self.state, event, viewport, self.rules);
        self.state = t.state;
        t.change
    }

    /// Back to `Idle`; reports `Cleared` when a box (live or committed) was dropped.
    pub fn reset(&mut self) -> Option<SelectionChange> {
        let had_box = self.state != SelectorState::Idle;
        self.state = SelectorState::Idle;
        had_box.then_some(SelectionChange::Cleared)
    }
}
