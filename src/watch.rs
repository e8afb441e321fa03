//! Detection of pipes that keep failing
//!
//! Unexpected URB states are logged and the transfer is polled again on the next step, indefinitely.
//! If [`Config::stuck_timeout`](crate::Config::stuck_timeout) is set, a pipe that reports nothing
//! but unexpected states for that long is reported as [`PollResult::Stuck`](crate::PollResult::Stuck).
//!
//! Time is measured in frames, counted by [`HciTransport::sof`](crate::HciTransport::sof).

/// Current frame, and the number of frames after which a failing pipe counts as stuck
#[derive(Copy, Clone)]
pub(crate) struct Timing {
    pub now: u32,
    pub stuck_after: Option<u32>,
}

#[derive(Default)]
pub(crate) struct StuckWatch {
    since: Option<u32>,
}

impl StuckWatch {
    pub const fn new() -> Self {
        Self { since: None }
    }

    /// The pipe reported an expected state
    pub fn healthy(&mut self) {
        self.since = None;
    }

    /// The pipe reported an unexpected state.
    ///
    /// Returns `true` once per elapsed timeout.
    pub fn failing(&mut self, timing: Timing) -> bool {
        let Some(stuck_after) = timing.stuck_after else {
            return false
        };
        let since = *self.since.get_or_insert(timing.now);
        if timing.now.wrapping_sub(since) >= stuck_after {
            self.since = Some(timing.now);
            true
        } else {
            false
        }
    }
}
