//! Button debounce state machine.
//!
//! The first raw edge opens a settle window; the level sampled when the
//! window closes decides whether a button event happened. Sampling the
//! level at the end, not at the first edge, is what rejects noise that has
//! already relaxed by then.

/// Debouncer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Settling { expiry: u64 },
}

/// What a raw edge did to the debouncer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// A settle window opened; the edge source must be masked until `expiry`
    Started { expiry: u64 },
    /// Bounce inside an open window
    Ignored,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: u64,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(window: u64) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn is_settling(&self) -> bool {
        matches!(self.state, DebounceState::Settling { .. })
    }

    /// Expiry of the open window
    pub fn expiry(&self) -> Option<u64> {
        match self.state {
            DebounceState::Idle => None,
            DebounceState::Settling { expiry } => Some(expiry),
        }
    }

    pub fn on_edge(&mut self, now: u64) -> Edge {
        match self.state {
            DebounceState::Idle => {
                let expiry = now.saturating_add(self.window);
                self.state = DebounceState::Settling { expiry };
                Edge::Started { expiry }
            }
            DebounceState::Settling { .. } => Edge::Ignored,
        }
    }

    /// Closes the window if it has expired at `now`. Returns `true` when it
    /// did, in which case the caller samples the level and unmasks the edge.
    pub fn expire(&mut self, now: u64) -> bool {
        match self.state {
            DebounceState::Settling { expiry } if now >= expiry => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }
}
