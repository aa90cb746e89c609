//! DragDrop State Machine
//!
//! Framework-free drag-and-drop bookkeeping for ordered, grouped lists.
//! Pointer handlers of any UI shell feed events in; a drop yields at most
//! one [`DropIntent`]. Uses a movement threshold to distinguish click from drag.

use serde::{Deserialize, Serialize};

/// Movement threshold in pixels to start dragging
pub const DRAG_THRESHOLD_PX: i32 = 5;

/// Drop target types
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropTarget<I, G> {
    /// Drop on an item row (place next to it)
    Item(I),
    /// Drop on a group header/body (None = ungrouped bucket)
    Group(Option<G>),
}

/// Intent emitted by a completed drop
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropIntent<I, G> {
    /// Reorder `item` to the slot currently held by `target`
    Reorder { item: I, target: I },
    /// Move `item` into `group`
    Reassign { item: I, group: Option<G> },
}

/// Drag state. A hover target cannot exist without an active drag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DragState<I, G> {
    Idle,
    Dragging {
        item: I,
        origin: Option<G>,
    },
    Hovering {
        item: I,
        origin: Option<G>,
        target: DropTarget<I, G>,
    },
}

impl<I, G> Default for DragState<I, G> {
    fn default() -> Self {
        DragState::Idle
    }
}

/// Result of a pointer entering or leaving a zone
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoverChange {
    /// A new hover target was recorded
    Entered,
    /// Same zone as before; nothing to re-render
    Unchanged,
    /// Hover target cleared, drag still active
    Cleared,
    /// Event does not apply (no drag, or zone of the dragged item)
    Ignored,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DragError {
    /// A drag is already active; it must be dropped or cancelled first
    AlreadyDragging,
}

impl std::fmt::Display for DragError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DragError::AlreadyDragging => write!(f, "Another drag is already in progress"),
        }
    }
}

impl std::error::Error for DragError {}

/// Drag interaction state machine
#[derive(Clone, Debug)]
pub struct DragMachine<I, G> {
    state: DragState<I, G>,
}

impl<I, G> Default for DragMachine<I, G> {
    fn default() -> Self {
        Self { state: DragState::Idle }
    }
}

impl<I, G> DragMachine<I, G>
where
    I: Clone + PartialEq + std::fmt::Debug,
    G: Clone + PartialEq + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self { state: DragState::Idle }
    }

    pub fn state(&self) -> &DragState<I, G> {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        !matches!(self.state, DragState::Idle)
    }

    /// Item currently being dragged
    pub fn dragged(&self) -> Option<&I> {
        match &self.state {
            DragState::Idle => None,
            DragState::Dragging { item, .. } | DragState::Hovering { item, .. } => Some(item),
        }
    }

    pub fn hover_target(&self) -> Option<&DropTarget<I, G>> {
        match &self.state {
            DragState::Hovering { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Start dragging `item`, which currently lives in `origin`
    pub fn begin(&mut self, item: I, origin: Option<G>) -> Result<(), DragError> {
        if self.is_dragging() {
            return Err(DragError::AlreadyDragging);
        }
        log::debug!("[DND] Begin drag: item={:?}, origin={:?}", item, origin);
        self.state = DragState::Dragging { item, origin };
        Ok(())
    }

    /// Pointer entered a drop zone
    pub fn enter(&mut self, zone: DropTarget<I, G>) -> HoverChange {
        let (item, origin) = match std::mem::take(&mut self.state) {
            DragState::Idle => return HoverChange::Ignored,
            DragState::Dragging { item, origin } => (item, origin),
            DragState::Hovering { item, origin, target } => {
                if target == zone {
                    self.state = DragState::Hovering { item, origin, target };
                    return HoverChange::Unchanged;
                }
                (item, origin)
            }
        };

        // Don't allow dropping on self
        if matches!(&zone, DropTarget::Item(id) if *id == item) {
            self.state = DragState::Dragging { item, origin };
            return HoverChange::Ignored;
        }

        self.state = DragState::Hovering { item, origin, target: zone };
        HoverChange::Entered
    }

    /// Pointer left a drop zone. Only clears when leaving the current target,
    /// since the next zone's enter may arrive before this zone's leave.
    pub fn leave(&mut self, zone: &DropTarget<I, G>) -> HoverChange {
        match std::mem::take(&mut self.state) {
            DragState::Hovering { item, origin, target } if target == *zone => {
                self.state = DragState::Dragging { item, origin };
                HoverChange::Cleared
            }
            other => {
                self.state = other;
                HoverChange::Ignored
            }
        }
    }

    /// Drop whatever is being dragged. Always ends in `Idle`.
    pub fn drop_item(&mut self) -> Option<DropIntent<I, G>> {
        match std::mem::take(&mut self.state) {
            DragState::Hovering { item, origin, target } => match target {
                DropTarget::Item(target) => {
                    log::debug!("[DND] Drop on item: dragged={:?}, target={:?}", item, target);
                    Some(DropIntent::Reorder { item, target })
                }
                DropTarget::Group(group) if group == origin => {
                    log::debug!("[DND] Drop on own group ignored: dragged={:?}", item);
                    None
                }
                DropTarget::Group(group) => {
                    log::debug!("[DND] Drop on group: dragged={:?}, group={:?}", item, group);
                    Some(DropIntent::Reassign { item, group })
                }
            },
            DragState::Dragging { item, .. } => {
                log::debug!("[DND] Drop without target: dragged={:?}", item);
                None
            }
            DragState::Idle => None,
        }
    }

    /// Abandon the drag (escape, pointer left the window, error)
    pub fn cancel(&mut self) {
        if let Some(item) = self.dragged() {
            log::debug!("[DND] Drag cancelled: item={:?}", item);
        }
        self.state = DragState::Idle;
    }

    /// Back to `Idle` without logging, e.g. when the list is reloaded
    pub fn reset(&mut self) {
        self.state = DragState::Idle;
    }
}

/// Tracks a pressed-but-not-yet-dragging item
#[derive(Clone, Debug)]
pub struct PressTracker<I> {
    pending: Option<(I, i32, i32)>,
    threshold_px: i32,
}

impl<I: Clone> Default for PressTracker<I> {
    fn default() -> Self {
        Self::new(DRAG_THRESHOLD_PX)
    }
}

impl<I: Clone> PressTracker<I> {
    pub fn new(threshold_px: i32) -> Self {
        Self { pending: None, threshold_px }
    }

    /// Record pending drag with start position
    pub fn press(&mut self, item: I, x: i32, y: i32) {
        self.pending = Some((item, x, y));
    }

    pub fn pending(&self) -> Option<&I> {
        self.pending.as_ref().map(|(item, _, _)| item)
    }

    /// Returns the item to start dragging once moved beyond the threshold
    pub fn moved(&mut self, x: i32, y: i32) -> Option<I> {
        let (_, start_x, start_y) = self.pending.as_ref()?;
        let dx = (x - start_x).abs();
        let dy = (y - start_y).abs();
        if dx > self.threshold_px || dy > self.threshold_px {
            return self.pending.take().map(|(item, _, _)| item);
        }
        None
    }

    pub fn release(&mut self) {
        self.pending = None;
    }
}
