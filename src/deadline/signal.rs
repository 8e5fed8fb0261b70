//! `SIGALRM` backed deadline.
//!
//! `setitimer(ITIMER_REAL)` is process-wide, so at most one [`Alarm`] is armed
//! at any time. The handler only stores to an atomic, which is
//! async-signal-safe. It is installed on first use and left in place so that a
//! signal already in flight when an alarm is dropped never meets the default
//! (terminating) disposition.

use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

static ARMED: AtomicBool = AtomicBool::new(false);
static FIRED: AtomicBool = AtomicBool::new(false);
static HANDLER: OnceLock<bool> = OnceLock::new();

extern "C" fn on_alarm(_signum: libc::c_int) {
    FIRED.store(true, Ordering::SeqCst);
}

/// Install `on_alarm` unless someone else already owns `SIGALRM`.
fn install_handler() -> bool {
    *HANDLER.get_or_init(|| unsafe {
        let mut current: libc::sigaction = mem::zeroed();
        if libc::sigaction(libc::SIGALRM, ptr::null(), &mut current) != 0 {
            return false;
        }
        if current.sa_sigaction != libc::SIG_DFL && current.sa_sigaction != libc::SIG_IGN {
            return false;
        }

        let mut action: libc::sigaction = mem::zeroed();
        action.sa_sigaction = on_alarm as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaction(libc::SIGALRM, &action, ptr::null_mut()) == 0
    })
}

pub(crate) struct Alarm {
    timer_set: bool,
}

impl Alarm {
    /// Arm the process timer, or `None` if another alarm holds it, the signal
    /// is owned elsewhere, or the kernel refuses.
    pub(crate) fn arm(budget: Duration) -> Option<Alarm> {
        if !install_handler() {
            return None;
        }
        if ARMED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        FIRED.store(false, Ordering::SeqCst);

        // setitimer treats a zero value as "disarm"; an empty budget is
        // already spent.
        if budget < Duration::from_micros(1) {
            FIRED.store(true, Ordering::SeqCst);
            return Some(Alarm { timer_set: false });
        }

        let value = libc::itimerval {
            it_interval: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            it_value: libc::timeval {
                tv_sec: libc::time_t::try_from(budget.as_secs()).unwrap_or(libc::time_t::MAX),
                tv_usec: budget.subsec_micros() as libc::suseconds_t,
            },
        };
        if unsafe { libc::setitimer(libc::ITIMER_REAL, &value, ptr::null_mut()) } != 0 {
            ARMED.store(false, Ordering::SeqCst);
            return None;
        }

        Some(Alarm { timer_set: true })
    }

    pub(crate) fn fired(&self) -> bool {
        FIRED.load(Ordering::Relaxed)
    }
}

impl Drop for Alarm {
    fn drop(&mut self) {
        if self.timer_set {
            unsafe {
                let zero: libc::itimerval = mem::zeroed();
                libc::setitimer(libc::ITIMER_REAL, &zero, ptr::null_mut());
            }
        }
        ARMED.store(false, Ordering::SeqCst);
    }
}

