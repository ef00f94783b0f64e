use std::time::{Duration, Instant};

pub const DEFAULT_THRESHOLD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Tap,
    LongPress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressState {
    Idle,
    Pending { deadline: Instant },
    /// The long press already acted; the release must be swallowed.
    Fired,
}

/// Tap vs. long-press recognizer for one tile: `Idle -> Pending -> Fired -> Idle`.
#[derive(Debug, Clone)]
pub struct LongPress {
    threshold: Duration,
    state: PressState,
}

impl Default for LongPress {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl LongPress {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            state: PressState::Idle,
        }
    }

    /// Starts a new session, discarding whatever the previous one left.
    pub fn pointer_down(&mut self, now: Instant) {
        self.state = PressState::Pending {
            deadline: now + self.threshold,
        };
    }

    /// Fires the timer if it has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<Gesture> {
        match self.state {
            PressState::Pending { deadline } if now >= deadline => {
                self.state = PressState::Fired;
                Some(Gesture::LongPress)
            }
            _ => None,
        }
    }

    pub fn pointer_up(&mut self, now: Instant) -> Option<Gesture> {
        // The timer would have fired before this release was delivered.
        if let Some(fired) = self.poll(now) {
            self.state = PressState::Idle;
            return Some(fired);
        }
        let gesture = match self.state {
            PressState::Pending { .. } => Some(Gesture::Tap),
            PressState::Fired => None,
            // Release without a press on this tile, e.g. a drag that began
            // elsewhere.
            PressState::Idle => None,
        };
        self.state = PressState::Idle;
        gesture
    }

    /// Pointer left the tile or the platform cancelled the pointer.
    pub fn cancel(&mut self) {
        self.state = PressState::Idle;
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match self.state {
            PressState::Pending { deadline } => Some(deadline.saturating_duration_since(now)),
            _ => None,
        }
    }
}
