//! Window bounds and per-chapter offset bookkeeping.

use std::collections::BTreeMap;
use std::ops::{Range, RangeInclusive};

/// Inclusive chapter-index bounds currently materialised in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadedWindow {
    bounds: Option<(usize, usize)>,
}

impl LoadedWindow {
    pub const EMPTY: Self = Self { bounds: None };

    pub const fn single(index: usize) -> Self {
        Self {
            bounds: Some((index, index)),
        }
    }

    pub const fn start(&self) -> Option<usize> {
        match self.bounds {
            Some((start, _)) => Some(start),
            None => None,
        }
    }

    pub const fn end(&self) -> Option<usize> {
        match self.bounds {
            Some((_, end)) => Some(end),
            None => None,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    /// Number of chapters in the window.
    pub const fn len(&self) -> usize {
        match self.bounds {
            Some((start, end)) => end - start + 1,
            None => 0,
        }
    }

    pub const fn contains(&self, index: usize) -> bool {
        match self.bounds {
            Some((start, end)) => start <= index && index <= end,
            None => false,
        }
    }

    /// Chapter indices in the window, top to bottom.
    pub fn indices(&self) -> RangeInclusive<usize> {
        match self.bounds {
            Some((start, end)) => start..=end,
            #[allow(clippy::reversed_empty_ranges)]
            None => 1..=0,
        }
    }

    /// The index an append must use, if any.
    pub fn next_below(&self) -> Option<usize> {
        self.end().map(|end| end + 1)
    }

    /// The index a prepend must use, if any.
    pub fn next_above(&self) -> Option<usize> {
        self.start().and_then(|start| start.checked_sub(1))
    }

    pub(super) const fn extend_end(&mut self) {
        if let Some((_, end)) = &mut self.bounds {
            *end += 1;
        }
    }

    pub(super) const fn extend_start(&mut self) {
        if let Some((start, _)) = &mut self.bounds {
            *start = start.saturating_sub(1);
        }
    }

    /// Drop the first chapter; empties the window when it was the last one.
    pub(super) const fn advance_start(&mut self) {
        if let Some((start, end)) = self.bounds {
            self.bounds = if start < end {
                Some((start + 1, end))
            } else {
                None
            };
        }
    }

    /// Drop the last chapter; empties the window when it was the last one.
    pub(super) const fn retreat_end(&mut self) {
        if let Some((start, end)) = self.bounds {
            self.bounds = if start < end {
                Some((start, end - 1))
            } else {
                None
            };
        }
    }
}

/// How buffer content moved relative to recorded ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Inserted(usize),
    Removed(usize),
}

/// A range that would overlap an already recorded neighbour.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("range {range:?} for chapter {index} overlaps chapter {neighbour}")]
pub struct RangeOverlap {
    pub index: usize,
    pub range: Range<usize>,
    pub neighbour: usize,
}

/// Character range of each loaded chapter inside the buffer.
///
/// Only chapters currently in the window have an entry. Ranges are kept
/// ordered and non-overlapping: for loaded chapters `i < j`,
/// `range(i).end <= range(j).start`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    ranges: BTreeMap<usize, Range<usize>>,
}

impl OffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the range of `index`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`RangeOverlap`] and leaves the table untouched when the
    /// range would break ordering with a recorded neighbour.
    pub fn record_range(&mut self, index: usize, range: Range<usize>) -> Result<(), RangeOverlap> {
        if let Some((&before, prev)) = self.ranges.range(..index).next_back()
            && prev.end > range.start
        {
            return Err(RangeOverlap {
                index,
                range,
                neighbour: before,
            });
        }
        if let Some((&after, next)) = self.ranges.range(index + 1..).next()
            && next.start < range.end
        {
            return Err(RangeOverlap {
                index,
                range,
                neighbour: after,
            });
        }
        self.ranges.insert(index, range);
        Ok(())
    }

    /// Move every range of chapter `first` and later by `shift`.
    pub fn shift_from(&mut self, first: usize, shift: Shift) {
        for range in self.ranges.range_mut(first..).map(|(_, r)| r) {
            match shift {
                Shift::Inserted(n) => {
                    range.start += n;
                    range.end += n;
                }
                Shift::Removed(n) => {
                    range.start = range.start.saturating_sub(n);
                    range.end = range.end.saturating_sub(n);
                }
            }
        }
    }

    /// Force the range of `index` to begin at offset 0.
    pub(super) fn pin_to_origin(&mut self, index: usize) {
        if let Some(range) = self.ranges.get_mut(&index)
            && range.start != 0
        {
            tracing::warn!(chapter = index, start = range.start, "first chapter did not start at 0");
            range.start = 0;
        }
    }

    /// Remove and return the range of `index`.
    pub fn forget(&mut self, index: usize) -> Option<Range<usize>> {
        self.ranges.remove(&index)
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    pub fn range(&self, index: usize) -> Option<Range<usize>> {
        self.ranges.get(&index).cloned()
    }

    /// The chapter whose range contains `offset`.
    pub fn chapter_at(&self, offset: usize) -> Option<usize> {
        self.ranges
            .iter()
            .find(|(_, r)| r.start < r.end && r.contains(&offset))
            .map(|(&index, _)| index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Range<usize>)> + '_ {
        self.ranges.iter().map(|(&i, r)| (i, r.clone()))
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
