//! Viewport positioning across buffer mutations.
//!
//! Scroll requests are never applied against a stale layout. A request made
//! right after a mutation is parked until a [`TextLayout`] covering that
//! mutation exists, then resolved to a row. Geometry that cannot be resolved
//! is skipped: visual position is best-effort.

use crate::ui::viewport::Viewport;

use super::layout::TextLayout;

/// Layout passes a parked request survives before it is dropped.
pub const MAX_LAYOUT_PASSES: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    /// Move caret and viewport top to the offset (explicit navigation).
    Jump(usize),
    /// Put the offset back at the viewport top (position preservation).
    Anchor(usize),
}

impl ScrollTarget {
    pub const fn offset(self) -> usize {
        match self {
            Self::Jump(offset) | Self::Anchor(offset) => offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingScroll {
    target: ScrollTarget,
    revision: u64,
    passes: u8,
}

/// Document offset at the top row of the viewport.
///
/// Returns `None` when the layout cannot resolve that row.
pub fn capture_anchor(layout: &TextLayout, viewport: &Viewport) -> Option<usize> {
    layout.offset_for_line(viewport.offset())
}

/// Where an anchor ends up once `removed_before` characters ahead of it
/// have been evicted.
pub const fn resolve_anchor_after_mutation(anchor: usize, removed_before: usize) -> usize {
    anchor.saturating_sub(removed_before)
}

#[derive(Debug, Clone, Default)]
pub struct ScrollAnchorController {
    pending: Option<PendingScroll>,
    caret: usize,
}

impl ScrollAnchorController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caret offset set by the last applied jump.
    pub const fn caret(&self) -> usize {
        self.caret
    }

    pub const fn pending(&self) -> Option<ScrollTarget> {
        match self.pending {
            Some(p) => Some(p.target),
            None => None,
        }
    }

    /// Request a jump to `offset` once layout catches up with `revision`.
    pub fn jump_to_offset(&mut self, offset: usize, buffer_len: usize, revision: u64) {
        self.park(ScrollTarget::Jump(offset.min(buffer_len)), revision);
    }

    /// Request that `offset` become the viewport top once layout catches up.
    pub fn keep_anchor(&mut self, offset: usize, buffer_len: usize, revision: u64) {
        self.park(ScrollTarget::Anchor(offset.min(buffer_len)), revision);
    }

    fn park(&mut self, target: ScrollTarget, revision: u64) {
        if let Some(previous) = self.pending {
            tracing::debug!(?previous, ?target, "scroll request replaced before layout");
        }
        self.pending = Some(PendingScroll {
            target,
            revision,
            passes: 0,
        });
    }

    pub fn cancel(&mut self) {
        self.pending = None;
        self.caret = 0;
    }

    /// Layout-pass hook: resolve the parked request against `layout`.
    ///
    /// Returns the applied target, if any.
    pub fn after_layout(&mut self, layout: &TextLayout, viewport: &mut Viewport) -> Option<ScrollTarget> {
        let mut pending = self.pending.take()?;
        if !layout.covers(pending.revision) {
            pending.passes += 1;
            if pending.passes < MAX_LAYOUT_PASSES {
                self.pending = Some(pending);
            } else {
                tracing::debug!(target = ?pending.target, "layout never caught up; scroll dropped");
            }
            return None;
        }

        let offset = pending.target.offset();
        let Some(line) = layout.line_for_offset(offset) else {
            crate::perf::log_event("anchor.geometry.skip", format!("offset={offset}"));
            return None;
        };
        viewport.go_to_line(line);
        if let ScrollTarget::Jump(offset) = pending.target {
            self.caret = offset;
        }
        Some(pending.target)
    }
}
