//! Transmission timing.
//!
//! The bus is half-duplex and the unit expects some breathing room between
//! frames. The [`Scheduler`] decides, once per tick, whether a pending command
//! or a poll may be written. At most one frame leaves per tick and a pending
//! command always goes first.

use crate::config::Config;
use core::time::Duration;

/// Rule that decides when the next poll is due.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum PollPolicy {
    /// Poll when the poll interval has elapsed since the last transmission.
    SinceLastSent,
    /// Poll when the poll interval has elapsed since the last reception
    /// and no response is outstanding.
    SinceLastReceived,
}

/// Kind of frame the scheduler allows to be sent.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Transmission {
    /// The pending command.
    Command,
    /// A poll request.
    Poll,
}

/// Tracks transmission and reception times.
#[derive(Debug)]
pub struct Scheduler {
    policy: PollPolicy,
    poll_interval: Duration,
    command_interval: Duration,
    response_timeout: Duration,
    last_sent: Option<Duration>,
    last_received: Option<Duration>,
    awaiting_response: bool,
}

impl Scheduler {
    /// Constructs a scheduler that hasn't sent or received anything yet.
    #[must_use]
    pub fn new(policy: PollPolicy, config: &Config) -> Self {
        Self {
            policy,
            poll_interval: config.poll_interval,
            command_interval: config.command_interval,
            response_timeout: config.response_timeout,
            last_sent: None,
            last_received: None,
            awaiting_response: false,
        }
    }

    /// Returns the frame that may be sent at `now`, if any.
    ///
    /// The command interval is the minimum spacing between any two frames,
    /// so a poll never follows a command too closely either.
    #[must_use]
    pub fn next(&self, now: Duration, command_pending: bool) -> Option<Transmission> {
        if !Self::elapsed(self.last_sent, now, self.command_interval) {
            return None;
        }

        if command_pending {
            Some(Transmission::Command)
        } else if self.is_poll_due(now) {
            Some(Transmission::Poll)
        } else {
            None
        }
    }

    /// Records a transmission.
    pub fn sent(&mut self, now: Duration) {
        self.last_sent = Some(now);
        self.awaiting_response = true;
    }

    /// Records the reception of a valid frame.
    pub fn received(&mut self, now: Duration) {
        self.last_received = Some(now);
        self.awaiting_response = false;
    }

    /// Returns `true` if a transmitted frame hasn't been answered yet.
    #[must_use]
    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    fn is_poll_due(&self, now: Duration) -> bool {
        match self.policy {
            PollPolicy::SinceLastSent => Self::elapsed(self.last_sent, now, self.poll_interval),
            PollPolicy::SinceLastReceived => {
                let quiet = Self::elapsed(self.last_received, now, self.poll_interval);
                let free = !self.awaiting_response
                    || Self::elapsed(self.last_sent, now, self.response_timeout);

                quiet && free
            }
        }
    }

    fn elapsed(since: Option<Duration>, now: Duration, interval: Duration) -> bool {
        since.is_none_or(|t| now.saturating_sub(t) > interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(val: u64) -> Duration {
        Duration::from_millis(val)
    }

    #[test]
    fn first_poll_immediate() {
        let sched = Scheduler::new(PollPolicy::SinceLastSent, &Config::default());

        assert_eq!(
            sched.next(Duration::ZERO, false),
            Some(Transmission::Poll),
            "first poll should be due immediately"
        );
    }

    #[test]
    fn command_priority() {
        let mut sched = Scheduler::new(PollPolicy::SinceLastSent, &Config::default());

        sched.sent(ms(0));

        assert_eq!(
            sched.next(ms(200), true),
            None,
            "command should wait for the command interval"
        );
        assert_eq!(
            sched.next(ms(251), true),
            Some(Transmission::Command),
            "command should be sent after the command interval"
        );
        assert_eq!(
            sched.next(ms(6000), true),
            Some(Transmission::Command),
            "command should take priority over a due poll"
        );
    }

    #[test]
    fn poll_since_last_sent() {
        let mut sched = Scheduler::new(PollPolicy::SinceLastSent, &Config::default());

        sched.sent(ms(1000));
        sched.received(ms(1100));

        assert_eq!(sched.next(ms(6000), false), None, "poll should not be due");
        assert_eq!(
            sched.next(ms(6001), false),
            Some(Transmission::Poll),
            "poll should be due after the poll interval"
        );
    }

    #[test]
    fn poll_since_last_received() {
        let mut sched = Scheduler::new(PollPolicy::SinceLastReceived, &Config::default());

        sched.sent(ms(0));
        sched.received(ms(100));

        assert_eq!(
            sched.next(ms(5050), false),
            None,
            "poll should be timed from the last reception"
        );
        assert_eq!(
            sched.next(ms(5101), false),
            Some(Transmission::Poll),
            "poll should be due after the poll interval"
        );

        sched.sent(ms(5101));

        assert!(sched.is_awaiting_response(), "response should be outstanding");
        assert_eq!(
            sched.next(ms(10_000), false),
            None,
            "poll should wait for the outstanding response"
        );
        assert_eq!(
            sched.next(ms(10_102), false),
            Some(Transmission::Poll),
            "outstanding response should be abandoned after the timeout"
        );
    }
}
