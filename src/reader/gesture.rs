//! Sustained scrolling past a window edge as a "load more" intent.
//!
//! A single wheel tick at the edge does nothing. Several same-direction
//! ticks in quick succession while already at the edge trigger a load.

/// Boundary events needed to trigger a load.
pub const AUTO_LOAD_EVENTS: u32 = 3;

/// Maximum gap between two events of one streak.
pub const AUTO_LOAD_WINDOW_MS: u64 = 900;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Streak {
    count: u32,
    last_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SustainedScrollDetector {
    up: Streak,
    down: Streak,
    threshold: u32,
    window_ms: u64,
}

impl Default for SustainedScrollDetector {
    fn default() -> Self {
        Self::new(AUTO_LOAD_EVENTS, AUTO_LOAD_WINDOW_MS)
    }
}

impl SustainedScrollDetector {
    pub const fn new(threshold: u32, window_ms: u64) -> Self {
        Self {
            up: Streak {
                count: 0,
                last_ms: None,
            },
            down: Streak {
                count: 0,
                last_ms: None,
            },
            threshold,
            window_ms,
        }
    }

    const fn streak(&mut self, direction: ScrollDirection) -> &mut Streak {
        match direction {
            ScrollDirection::Up => &mut self.up,
            ScrollDirection::Down => &mut self.down,
        }
    }

    /// Record a scroll event made while already at the `direction` edge.
    ///
    /// Returns true when the streak reaches the threshold; the streak then
    /// starts over.
    pub fn on_boundary(&mut self, direction: ScrollDirection, now_ms: u64) -> bool {
        let threshold = self.threshold;
        let window_ms = self.window_ms;
        let streak = self.streak(direction);
        let expired = streak
            .last_ms
            .is_none_or(|last| now_ms.saturating_sub(last) > window_ms);
        if expired {
            streak.count = 0;
        }
        streak.last_ms = Some(now_ms);
        streak.count += 1;
        if streak.count >= threshold {
            streak.count = 0;
            return true;
        }
        false
    }

    /// Record a scroll event made away from the `direction` edge.
    pub const fn off_boundary(&mut self, direction: ScrollDirection) {
        self.streak(direction).count = 0;
    }

    pub const fn count(&self, direction: ScrollDirection) -> u32 {
        match direction {
            ScrollDirection::Up => self.up.count,
            ScrollDirection::Down => self.down.count,
        }
    }

    pub fn reset(&mut self) {
        self.up = Streak::default();
        self.down = Streak::default();
    }
}
