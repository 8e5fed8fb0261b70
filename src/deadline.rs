//! Wall-clock budgets for a single parse.
//!
//! A [`Deadline`] hides which timer backend is in use. Callers only ever ask
//! whether it has [expired](Deadline::expired); the pipeline asks at least
//! once every [`Limits::check_interval`](crate::Limits::check_interval) token
//! visits.
//!
//! Every backend is polled: even the signal timer only sets a flag, so a
//! stage that never polls (comrak's parse inside
//! [`Tokenizer::tokenize`](crate::Tokenizer::tokenize)) runs to completion
//! before the expiry is noticed. [`run_isolated`](crate::run_isolated) is the
//! hard bound, since it kills the worker process.

#[cfg(unix)]
mod signal;

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::Error;

/// Timer backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum TimerStrategy {
    /// Use the signal timer when the platform has one and it is free,
    /// otherwise fall back to cooperative polling.
    #[default]
    Auto,

    /// `SIGALRM` raised by an interval timer flips an atomic flag
    /// asynchronously.  Only one can be armed per process at a time; further
    /// requests fall back to cooperative polling.
    ///
    /// The flag saves clock reads but does not interrupt anything: work
    /// between two checks still runs to its end.
    Signal,

    /// Compare the clock at every check.
    Cooperative,
}

impl TimerStrategy {
    /// Lower-case name, as accepted by the CLI.
    pub fn as_str(self) -> &'static str {
        match self {
            TimerStrategy::Auto => "auto",
            TimerStrategy::Signal => "signal",
            TimerStrategy::Cooperative => "cooperative",
        }
    }

    /// Parse a name produced by [`TimerStrategy::as_str`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "auto" => Some(TimerStrategy::Auto),
            "signal" => Some(TimerStrategy::Signal),
            "cooperative" => Some(TimerStrategy::Cooperative),
            _ => None,
        }
    }
}

impl fmt::Display for TimerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Backend {
    Unlimited,
    Cooperative { expires_at: Instant },
    #[cfg(unix)]
    Signal(signal::Alarm),
}

/// An armed wall-clock budget.
///
/// Dropping the deadline disarms it.
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
    backend: Backend,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn unlimited() -> Self {
        Deadline {
            started: Instant::now(),
            budget: None,
            backend: Backend::Unlimited,
        }
    }

    /// Arm a deadline of `budget` from now.  `None` never expires, and
    /// neither does a budget too large to be represented as an [`Instant`].
    pub fn start(budget: Option<Duration>, strategy: TimerStrategy) -> Self {
        let budget = match budget {
            Some(budget) => budget,
            None => return Deadline::unlimited(),
        };
        let started = Instant::now();
        let expires_at = match started.checked_add(budget) {
            Some(expires_at) => expires_at,
            None => {
                return Deadline {
                    started,
                    budget: Some(budget),
                    backend: Backend::Unlimited,
                }
            }
        };

        let backend = match strategy {
            TimerStrategy::Cooperative => Backend::Cooperative { expires_at },
            TimerStrategy::Auto | TimerStrategy::Signal => Self::signal_backend(budget)
                .unwrap_or(Backend::Cooperative { expires_at }),
        };

        Deadline {
            started,
            budget: Some(budget),
            backend,
        }
    }

    #[cfg(unix)]
    fn signal_backend(budget: Duration) -> Option<Backend> {
        signal::Alarm::arm(budget).map(Backend::Signal)
    }

    #[cfg(not(unix))]
    fn signal_backend(_budget: Duration) -> Option<Backend> {
        None
    }

    /// Whether the budget is used up.
    pub fn expired(&self) -> bool {
        match &self.backend {
            Backend::Unlimited => false,
            Backend::Cooperative { expires_at } => Instant::now() >= *expires_at,
            #[cfg(unix)]
            Backend::Signal(alarm) => alarm.fired(),
        }
    }

    /// `Err(Error::TimedOut)` once expired.
    pub fn check(&self) -> Result<(), Error> {
        if self.expired() {
            Err(Error::TimedOut)
        } else {
            Ok(())
        }
    }

    /// The backend actually in use.  `Auto` never appears here.
    pub fn strategy(&self) -> Option<TimerStrategy> {
        match self.backend {
            Backend::Unlimited => None,
            Backend::Cooperative { .. } => Some(TimerStrategy::Cooperative),
            #[cfg(unix)]
            Backend::Signal(_) => Some(TimerStrategy::Signal),
        }
    }

    /// The configured budget.
    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Time since the deadline was armed.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl fmt::Debug for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deadline")
            .field("budget", &self.budget)
            .field("strategy", &self.strategy())
            .field("expired", &self.expired())
            .finish()
    }
}

/// Counts token visits and polls a deadline every `interval` of them.
#[derive(Debug)]
pub(crate) struct Poller<'d> {
    deadline: &'d Deadline,
    interval: usize,
    countdown: usize,
}

impl<'d> Poller<'d> {
    pub(crate) fn new(deadline: &'d Deadline, interval: usize) -> Self {
        let interval = interval.max(1);
        Poller {
            deadline,
            interval,
            countdown: interval,
        }
    }

    #[inline]
    pub(crate) fn tick(&mut self) -> Result<(), Error> {
        self.countdown -= 1;
        if self.countdown == 0 {
            self.countdown = self.interval;
            self.deadline.check()?;
        }
        Ok(())
    }
}
