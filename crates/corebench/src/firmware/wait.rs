//! Bounded waiting.
//!
//! Every wait on hardware or on an interrupt is bounded; running out of
//! budget is an ordinary error, never a hang.

/// Budget ran out before the condition held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    pub budget: u32,
}

/// Polls `attempt` until it yields a value, at most `budget + 1` times.
///
/// `attempt` checks its condition and, when it does not yet hold, makes
/// one unit of progress (a spin iteration, a clock step) before returning
/// `None`.
pub fn bounded<T>(budget: u32, mut attempt: impl FnMut() -> Option<T>) -> Result<T, Timeout> {
    for _ in 0..=budget {
        if let Some(value) = attempt() {
            return Ok(value);
        }
    }
    Err(Timeout { budget })
}
