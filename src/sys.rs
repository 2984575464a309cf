use std::os::unix::io::{BorrowedFd, RawFd};
use std::time::Duration;

use polling::{Event, Events, PollMode, Poller};

use crate::EventMask;

/// Possible modes for registering a file descriptor
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Single event generation
    ///
    /// This FD will be disabled as soon as it has generated one event, until
    /// it is re-registered.
    OneShot,

    /// Level-triggering
    ///
    /// This FD will report events on every poll as long as the requested interests
    /// are available.
    Level,
}

/// Interest to register regarding the file descriptor
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Interest {
    /// Wait for the FD to be readable
    pub readable: bool,

    /// Wait for the FD to be writable
    pub writable: bool,

    /// Wait for the peer to hang up
    pub closed: bool,
}

impl From<EventMask> for Interest {
    fn from(mask: EventMask) -> Interest {
        Interest {
            readable: mask.contains(EventMask::READ),
            writable: mask.contains(EventMask::WRITE),
            closed: mask.contains(EventMask::CLOSED),
        }
    }
}

/// Readiness for a file descriptor notification
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Readiness {
    /// Is the FD readable
    pub readable: bool,

    /// Is the FD writable
    pub writable: bool,

    /// Has the peer hung up
    pub closed: bool,

    /// Is the FD in an error state
    pub error: bool,
}

impl Readiness {
    /// Shorthand for empty readiness
    pub const EMPTY: Readiness = Readiness {
        readable: false,
        writable: false,
        closed: false,
        error: false,
    };
}

#[derive(Debug)]
pub(crate) struct PollEvent {
    pub(crate) readiness: Readiness,
    pub(crate) key: usize,
}

/// The polling system
///
/// A thin layer over [`polling::Poller`] translating interests and readiness
/// and keeping the event storage between waits.
pub(crate) struct Poll {
    /// The handle to epoll/kqueue/... used to poll for events.
    poller: Poller,

    /// The events returned by the last wait.
    events: Events,

    /// Whether level triggering is emulated with oneshot registrations.
    ///
    /// Some platforms that `polling` supports do not support level-triggered
    /// events (as of the time of writing, Solaris and illumos). Level
    /// triggered sources are then registered oneshot and re-armed after
    /// every event they report.
    emulate_level: bool,
}

impl std::fmt::Debug for Poll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Poll { ... }")
    }
}

impl Poll {
    pub(crate) fn new() -> crate::Result<Poll> {
        Self::new_inner(false)
    }

    pub(crate) fn new_inner(force_fallback_lt: bool) -> crate::Result<Poll> {
        let poller = Poller::new()?;
        let emulate_level = !poller.supports_level() || force_fallback_lt;
        if emulate_level {
            log::debug!("[fibers-poll] Emulating level-triggered registrations");
        }

        Ok(Poll {
            poller,
            events: Events::new(),
            emulate_level,
        })
    }

    /// Wait for events, storing them for [`ready()`](Self::ready).
    pub(crate) fn wait(&mut self, timeout: Option<Duration>) -> crate::Result<usize> {
        self.events.clear();
        Ok(self.poller.wait(&mut self.events, timeout)?)
    }

    /// The events collected by the last wait, in the order the poller
    /// reported them.
    pub(crate) fn ready(&self) -> impl Iterator<Item = PollEvent> + '_ {
        self.events.iter().map(|ev| PollEvent {
            readiness: Readiness {
                readable: ev.readable,
                writable: ev.writable,
                closed: ev.is_interrupt(),
                error: ev.is_err().unwrap_or(false),
            },
            key: ev.key,
        })
    }

    /// Register a new file descriptor for polling
    ///
    /// # Safety
    ///
    /// The file descriptor must stay open until it is unregistered.
    pub(crate) unsafe fn register(
        &self,
        fd: RawFd,
        interest: Interest,
        mode: Mode,
        key: usize,
    ) -> crate::Result<()> {
        let ev = cvt_interest(interest, key);

        // SAFETY: See invariant on function.
        unsafe {
            self.poller.add_with_mode(fd, ev, self.cvt_mode(mode))?;
        }

        Ok(())
    }

    /// Update the interest or mode of a registered file descriptor
    ///
    /// This also re-enables a oneshot registration that already fired.
    pub(crate) fn reregister(
        &self,
        fd: BorrowedFd<'_>,
        interest: Interest,
        mode: Mode,
        key: usize,
    ) -> crate::Result<()> {
        self.poller
            .modify_with_mode(fd, cvt_interest(interest, key), self.cvt_mode(mode))?;
        Ok(())
    }

    /// Whether a registration in `mode` is disabled by the kernel after
    /// reporting, and must be re-registered to report again.
    pub(crate) fn is_oneshot(&self, mode: Mode) -> bool {
        mode == Mode::OneShot || self.emulate_level
    }

    /// Unregister a file descriptor
    ///
    /// This file descriptor will no longer generate events. Fails if the
    /// provided file descriptor is not currently registered.
    pub(crate) fn unregister(&self, fd: BorrowedFd<'_>) -> crate::Result<()> {
        self.poller.delete(fd)?;
        Ok(())
    }

    fn cvt_mode(&self, mode: Mode) -> PollMode {
        match mode {
            Mode::Level if !self.emulate_level => PollMode::Level,
            Mode::Level | Mode::OneShot => PollMode::Oneshot,
        }
    }
}

fn cvt_interest(interest: Interest, key: usize) -> Event {
    let mut ev = Event::new(key, interest.readable, interest.writable);
    ev.set_interrupt(interest.closed);
    ev
}
