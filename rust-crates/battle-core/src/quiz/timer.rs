use std::time::Duration;
use tokio::time::Instant;

const WHOLE_SECOND_MS: u128 = 1_000;
const FINAL_STEP_MS: u128 = 250;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

/// Identifies one question's deadline. Expiry requests carrying a token from an
/// earlier question or session are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerToken {
    pub session: SessionId,
    pub question: usize,
}

/// Answer deadline for the current question.
#[derive(Clone, Copy, Debug)]
pub struct QuizTimer {
    started_at: Instant,
    window: Duration,
}

impl QuizTimer {
    pub fn start(now: Instant, window: Duration) -> Self {
        Self {
            started_at: now,
            window,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.started_at + self.window
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline()
    }

    /// Seconds left as displayed: whole seconds while more than one second
    /// remains, then quarter-second steps down to zero at the deadline.
    pub fn remaining(&self, now: Instant) -> f32 {
        let remaining_ms = self
            .deadline()
            .saturating_duration_since(now)
            .as_millis();
        if remaining_ms > WHOLE_SECOND_MS {
            remaining_ms.div_ceil(WHOLE_SECOND_MS) as f32
        } else {
            remaining_ms.div_ceil(FINAL_STEP_MS) as f32 * 0.25
        }
    }
}
