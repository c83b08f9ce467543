//! Per-question countdown.
//!
//! The timer itself holds no clock: every call to [`QuestionTimer::tick`]
//! stands for one elapsed second. The session runner drives it from a
//! `tokio` interval, tests drive it by hand.

/// Lifecycle of a single countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Running,
    /// Stopped by an answer before reaching zero.
    Stopped,
    /// Reached zero. Expiry is reported exactly once.
    Expired,
    Cancelled,
}

/// What a single tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Tick { remaining: u32 },
    Expired,
    /// The timer was not running; nothing happened.
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionTimer {
    time_limit: u32,
    remaining: u32,
    state: TimerState,
}

impl QuestionTimer {
    /// Start a countdown of `time_limit` seconds.
    #[must_use]
    pub fn start(time_limit: u32) -> Self {
        Self {
            time_limit,
            remaining: time_limit,
            state: TimerState::Running,
        }
    }

    #[must_use]
    pub fn time_limit(&self) -> u32 {
        self.time_limit
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Seconds consumed so far.
    #[must_use]
    pub fn elapsed(&self) -> u32 {
        self.time_limit.saturating_sub(self.remaining)
    }

    /// Advance one second.
    pub fn tick(&mut self) -> TimerEvent {
        if self.state != TimerState::Running {
            return TimerEvent::Idle;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.state = TimerState::Expired;
            TimerEvent::Expired
        } else {
            TimerEvent::Tick {
                remaining: self.remaining,
            }
        }
    }

    /// Stop the countdown and return the seconds taken.
    ///
    /// Calling this on a timer that is no longer running leaves its state
    /// untouched and returns the elapsed seconds at the time it stopped.
    pub fn stop(&mut self) -> u32 {
        if self.state == TimerState::Running {
            self.state = TimerState::Stopped;
        }
        self.elapsed()
    }

    pub fn cancel(&mut self) {
        if self.state == TimerState::Running {
            self.state = TimerState::Cancelled;
        }
    }

    /// Restart for the next question.
    pub fn reset(&mut self, time_limit: u32) {
        *self = Self::start(time_limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_and_expires_once() {
        let mut timer = QuestionTimer::start(3);
        assert_eq!(timer.tick(), TimerEvent::Tick { remaining: 2 });
        assert_eq!(timer.tick(), TimerEvent::Tick { remaining: 1 });
        assert_eq!(timer.tick(), TimerEvent::Expired);
        assert_eq!(timer.state(), TimerState::Expired);
        assert_eq!(timer.tick(), TimerEvent::Idle);
        assert_eq!(timer.tick(), TimerEvent::Idle);
        assert_eq!(timer.remaining(), 0);
    }

    #[test]
    fn stop_reports_time_taken() {
        let mut timer = QuestionTimer::start(30);
        for _ in 0..12 {
            timer.tick();
        }
        assert_eq!(timer.stop(), 12);
        assert_eq!(timer.state(), TimerState::Stopped);
        assert_eq!(timer.tick(), TimerEvent::Idle);
        assert_eq!(timer.remaining(), 18);
    }

    #[test]
    fn stop_before_first_tick_is_zero() {
        let mut timer = QuestionTimer::start(10);
        assert_eq!(timer.stop(), 0);
    }

    #[test]
    fn cancel_silences_ticks() {
        let mut timer = QuestionTimer::start(2);
        timer.cancel();
        assert_eq!(timer.state(), TimerState::Cancelled);
        assert_eq!(timer.tick(), TimerEvent::Idle);
    }

    #[test]
    fn reset_restarts_with_new_limit() {
        let mut timer = QuestionTimer::start(1);
        assert_eq!(timer.tick(), TimerEvent::Expired);
        timer.reset(5);
        assert!(timer.is_running());
        assert_eq!(timer.remaining(), 5);
        assert_eq!(timer.time_limit(), 5);
        assert_eq!(timer.tick(), TimerEvent::Tick { remaining: 4 });
    }
}
