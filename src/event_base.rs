use std::collections::HashMap;
use std::fmt::Debug;
use std::io;
use std::mem;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::time::Instant;

use slab::Slab;

use crate::hook::{NoWaitHook, WaitHook};
use crate::sys::{Interest, Mode, Poll};
use crate::time::{TimeUnits, Timeout};
use crate::token::{VersionCounter, WatchToken};
use crate::{wake, Error, EventBuffer, EventMask, EventRecord};

/// Settings of an [`EventBase`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// The unit timeouts given to [`EventBase::run_once`] are expressed in.
    pub time_units: TimeUnits,
}

#[derive(Debug)]
struct Watch {
    fd: RawFd,
    mask: EventMask,
    version: u32,
    /// Cleared once a non-persistent watch has been recorded.
    armed: bool,
}

/// Union of the masks of the armed watches among `keys`.
fn armed_mask(watches: &Slab<Watch>, keys: &[usize]) -> EventMask {
    keys.iter()
        .map(|&key| &watches[key])
        .filter(|watch| watch.armed)
        .fold(EventMask::empty(), |acc, watch| acc | watch.mask)
}

/// How a descriptor is registered for the combined mask of its watches.
fn registration(mask: EventMask) -> (Interest, Mode) {
    let mode = if mask.is_persistent() {
        Mode::Level
    } else {
        Mode::OneShot
    };
    (Interest::from(mask), mode)
}

/// A readiness collector
///
/// An event base owns one OS poller and a registry of watches. Each call to
/// [`run_once`](Self::run_once) waits once and writes the watches that became
/// ready into its [`EventBuffer`], which the caller then reads through
/// [`events`](Self::events).
///
/// The poller is released when the event base is dropped.
pub struct EventBase {
    poll: Poll,
    watches: Slab<Watch>,
    /// The watches of each descriptor. A descriptor is registered once with
    /// the poller, keyed by its own value.
    fds: HashMap<RawFd, Vec<usize>>,
    versions: VersionCounter,
    buffer: EventBuffer,
    hook: Box<dyn WaitHook + Send>,
    config: Config,
}

impl Debug for EventBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventBase { ... }")
    }
}

impl EventBase {
    /// Create a new event base writing into `buffer`
    ///
    /// Fails if the initialization of the polling system failed.
    pub fn new(buffer: EventBuffer) -> crate::Result<EventBase> {
        Self::with_config(buffer, Config::default())
    }

    /// Create a new event base with the given settings
    pub fn with_config(buffer: EventBuffer, config: Config) -> crate::Result<EventBase> {
        Self::from_poll(Poll::new()?, buffer, config)
    }

    fn from_poll(poll: Poll, buffer: EventBuffer, config: Config) -> crate::Result<EventBase> {
        log::debug!(
            "[fibers-poll] Created event base with room for {} events",
            buffer.capacity()
        );
        Ok(EventBase {
            poll,
            watches: Slab::new(),
            fds: HashMap::new(),
            versions: VersionCounter::default(),
            buffer,
            hook: Box::new(NoWaitHook),
            config,
        })
    }

    /// Install the hook called around blocking waits.
    pub fn set_wait_hook<H: WaitHook + Send + 'static>(&mut self, hook: H) {
        self.hook = Box::new(hook);
    }

    /// Watch `fd` for the conditions in `mask`
    ///
    /// With [`EventMask::PERSIST`] the watch reports every iteration in which
    /// the condition holds. Without it the watch reports once and then stays
    /// silent until it is removed.
    ///
    /// A descriptor can carry several watches, for instance one for reading
    /// and one for writing. Each of them reports on its own.
    ///
    /// The event buffer must be large enough for every registered watch to
    /// report in the same iteration; see [`watch_count`](Self::watch_count).
    ///
    /// # Safety
    ///
    /// `fd` must not be closed before the watch is removed with
    /// [`remove_watch`](Self::remove_watch).
    pub unsafe fn add_watch(&mut self, fd: impl AsFd, mask: EventMask) -> crate::Result<WatchToken> {
        let fd = fd.as_fd().as_raw_fd();
        let version = self.versions.next();
        let key = self.watches.insert(Watch {
            fd,
            mask,
            version,
            armed: true,
        });

        let keys = self.fds.entry(fd).or_default();
        keys.push(key);
        let (interest, mode) = registration(armed_mask(&self.watches, keys));
        let ret = if keys.len() == 1 {
            // SAFETY: forwarded from this function's contract.
            unsafe { self.poll.register(fd, interest, mode, fd as usize) }
        } else {
            // SAFETY: forwarded from this function's contract.
            let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
            self.poll.reregister(borrowed, interest, mode, fd as usize)
        };

        if let Err(err) = ret {
            self.forget(key);
            return Err(err);
        }
        log::debug!("[fibers-poll] Watching fd({}) for {:?}", fd, mask);

        Ok(WatchToken { key, version })
    }

    /// Cancel a watch
    ///
    /// Once this returns, the watch is never reported again, even if its
    /// descriptor was already ready. Other watches on the same descriptor
    /// are not affected.
    pub fn remove_watch(&mut self, token: WatchToken) -> crate::Result<()> {
        match self.watches.get(token.key) {
            Some(watch) if watch.version == token.version => {}
            _ => return Err(Error::InvalidToken),
        }
        let watch = self.forget(token.key);
        log::debug!("[fibers-poll] Removing watch on fd({})", watch.fd);

        // SAFETY: add_watch's contract keeps the fd open until now.
        let fd = unsafe { BorrowedFd::borrow_raw(watch.fd) };
        match self.fds.get(&watch.fd) {
            None => self.poll.unregister(fd),
            Some(keys) => {
                let (interest, mode) = registration(armed_mask(&self.watches, keys));
                self.poll
                    .reregister(fd, interest, mode, watch.fd as usize)
            }
        }
    }

    /// Drop a watch from the registry, and its descriptor once it has no
    /// watch left.
    fn forget(&mut self, key: usize) -> Watch {
        let watch = self.watches.remove(key);
        if let Some(keys) = self.fds.get_mut(&watch.fd) {
            keys.retain(|&k| k != key);
            if keys.is_empty() {
                self.fds.remove(&watch.fd);
            }
        }
        watch
    }

    /// Replace the event buffer, returning the previous one
    ///
    /// The next iteration writes into the new buffer and is bounded by its
    /// capacity.
    pub fn resize(&mut self, buffer: EventBuffer) -> EventBuffer {
        log::debug!(
            "[fibers-poll] Resizing event buffer from {} to {} events",
            self.buffer.capacity(),
            buffer.capacity()
        );
        mem::replace(&mut self.buffer, buffer)
    }

    /// Run one iteration of the poller
    ///
    /// `timeout` is expressed in the configured [`TimeUnits`]: negative
    /// waits until at least one watch reports, zero only checks readiness,
    /// positive waits at most that long.
    ///
    /// `wake_fd` is the write end of the wake pipe, given to the
    /// [`WaitHook`] before a wait that may block. `woke_fd` is its read end:
    /// it is removed from the results and drained.
    ///
    /// Returns the number of ready events, available from
    /// [`events`](Self::events) until the next iteration.
    pub fn run_once(
        &mut self,
        wake_fd: BorrowedFd<'_>,
        woke_fd: BorrowedFd<'_>,
        timeout: i64,
    ) -> crate::Result<usize> {
        let timeout = Timeout::from_units(timeout, self.config.time_units);
        self.run_with_timeout(wake_fd, woke_fd, timeout)
    }

    /// Same as [`run_once`](Self::run_once), with an already converted timeout.
    pub fn run_with_timeout(
        &mut self,
        wake_fd: BorrowedFd<'_>,
        woke_fd: BorrowedFd<'_>,
        timeout: Timeout,
    ) -> crate::Result<usize> {
        self.buffer.clear();

        if timeout.may_block() {
            if self.hook.prepare_to_wait(wake_fd) {
                log::trace!("[fibers-poll] Wait interrupted before it started");
                return Ok(0);
            }
            let ret = self.collect(timeout);
            self.hook.wait_finished();
            ret?;
        } else {
            self.collect(timeout)?;
        }

        if self.buffer.remove_fd(woke_fd.as_raw_fd()) > 0 {
            let drained = wake::drain(woke_fd);
            log::trace!("[fibers-poll] Drained {} wake bytes", drained);
        }

        log::trace!("[fibers-poll] Iteration reported {} events", self.buffer.len());
        Ok(self.buffer.len())
    }

    fn collect(&mut self, timeout: Timeout) -> crate::Result<()> {
        let limit = timeout.as_poll_timeout();
        let mut remaining = limit;
        let start = Instant::now();

        loop {
            match self.poll.wait(remaining) {
                Ok(_) => {}
                Err(Error::IoError(err)) if err.kind() == io::ErrorKind::Interrupted => {
                    // Interrupted by a signal. Update timeout and retry.
                    if let Some(to) = limit {
                        let elapsed = start.elapsed();
                        if elapsed >= to {
                            return Ok(());
                        }
                        remaining = Some(to - elapsed);
                    }
                    continue;
                }
                Err(err) => return Err(err),
            }

            self.deposit()?;

            // A blocking wait only ends once something was reported.
            if timeout != Timeout::Block || !self.buffer.is_empty() {
                return Ok(());
            }
        }
    }

    fn deposit(&mut self) -> crate::Result<()> {
        let mut overflow = None;

        for event in self.poll.ready() {
            let fd = event.key as RawFd;
            // Events of descriptors no longer watched are dropped.
            let Some(keys) = self.fds.get(&fd) else {
                continue;
            };
            let before = armed_mask(&self.watches, keys);
            let ready = EventMask::from(event.readiness);

            for &key in keys {
                let watch = &mut self.watches[key];
                let mask = ready & watch.mask.conditions();
                if !watch.armed || mask.is_empty() {
                    continue;
                }
                match self.buffer.push(fd, mask) {
                    Ok(()) => watch.armed = watch.mask.is_persistent(),
                    // Reported once every descriptor has been re-armed.
                    Err(err) => {
                        overflow.get_or_insert(err);
                    }
                }
            }

            let after = armed_mask(&self.watches, keys);
            let (interest, mode) = registration(after);
            let disarmed = after != before || self.poll.is_oneshot(mode);
            if disarmed && !after.conditions().is_empty() {
                // SAFETY: add_watch's contract keeps the fd open.
                let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
                self.poll.reregister(borrowed, interest, mode, event.key)?;
            }
        }

        overflow.map_or(Ok(()), Err)
    }

    /// The events reported by the last iteration.
    pub fn events(&self) -> &[EventRecord] {
        self.buffer.records()
    }

    /// The buffer events are written to.
    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    /// Maximum number of events one iteration can report.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Number of registered watches.
    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }
}
