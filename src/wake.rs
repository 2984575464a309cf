//! The wake pipe
//!
//! A blocked iteration can only be interrupted from another thread by making
//! one of its watched descriptors ready. The wake pipe is that descriptor:
//! writing a byte to the write end makes the read end readable, and the
//! event base strips the read end from its results and drains it so the
//! next iteration does not wake spuriously.

use std::os::unix::io::{AsFd, BorrowedFd, OwnedFd};
use std::sync::Arc;

use rustix::io::Errno;

use crate::Error;

/// Size of the chunks the read end is drained with.
const DRAIN_CHUNK: usize = 32;

#[cfg(any(target_os = "macos", target_os = "ios"))]
#[inline]
fn make_ends() -> std::io::Result<(OwnedFd, OwnedFd)> {
    // No pipe2 here, set the flags after creating the pipe.
    use rustix::fs::{fcntl_getfl, fcntl_setfl, OFlags};
    use rustix::io::{fcntl_setfd, FdFlags};

    let (read, write) = rustix::pipe::pipe()?;
    for end in [&read, &write] {
        fcntl_setfd(end, FdFlags::CLOEXEC)?;
        fcntl_setfl(end, fcntl_getfl(end)? | OFlags::NONBLOCK)?;
    }
    Ok((read, write))
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
#[inline]
fn make_ends() -> std::io::Result<(OwnedFd, OwnedFd)> {
    use rustix::pipe::{pipe_with, PipeFlags};

    Ok(pipe_with(PipeFlags::CLOEXEC | PipeFlags::NONBLOCK)?)
}

/// Create a new wake pipe
///
/// The [`WakeSender`] can be cloned and sent to other threads. The
/// [`WakeReceiver`]'s descriptor is the one to watch for reading and to
/// pass as the woke descriptor of [`EventBase::run_once`].
///
/// [`EventBase::run_once`]: crate::EventBase::run_once
pub fn make_wake_pipe() -> crate::Result<(WakeSender, WakeReceiver)> {
    let (read, write) = make_ends()?;
    Ok((
        WakeSender {
            pipe: Arc::new(write),
        },
        WakeReceiver { pipe: read },
    ))
}

/// Write one byte to a wake descriptor.
///
/// A full pipe already guarantees the reader will wake up, so a
/// would-block failure is not an error.
pub fn wake(fd: impl AsFd) -> crate::Result<()> {
    loop {
        match rustix::io::write(&fd, &[0u8]) {
            Ok(_) => return Ok(()),
            Err(Errno::INTR) => continue,
            Err(Errno::AGAIN) => return Ok(()),
            Err(e) => return Err(Error::Wake(e.into())),
        }
    }
}

/// Read everything pending on a wake descriptor.
///
/// Reads until the descriptor would block or reaches end-of-file, so any
/// number of queued wake bytes is consumed. Read errors are logged and
/// otherwise ignored. Returns the number of bytes drained.
pub fn drain(fd: impl AsFd) -> usize {
    let mut buf = [0u8; DRAIN_CHUNK];
    let mut drained = 0;
    loop {
        match rustix::io::read(&fd, &mut buf) {
            Ok(0) => break,
            Ok(n) => drained += n,
            Err(Errno::INTR) => continue,
            Err(Errno::AGAIN) => break,
            Err(e) => {
                log::warn!("[fibers-poll] Failed to drain wake fd: {:?}", e);
                break;
            }
        }
    }
    drained
}

/// The sending end of a wake pipe.
#[derive(Clone, Debug)]
pub struct WakeSender {
    pipe: Arc<OwnedFd>,
}

impl WakeSender {
    /// Interrupt the iteration watching the matching [`WakeReceiver`].
    pub fn wake(&self) -> crate::Result<()> {
        wake(&*self.pipe)
    }
}

impl AsFd for WakeSender {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.pipe.as_fd()
    }
}

/// The receiving end of a wake pipe.
#[derive(Debug)]
pub struct WakeReceiver {
    pipe: OwnedFd,
}

impl WakeReceiver {
    /// Consume all pending wake bytes.
    pub fn drain(&self) -> usize {
        drain(&self.pipe)
    }
}

impl AsFd for WakeReceiver {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.pipe.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_then_drain() {
        let (sender, receiver) = make_wake_pipe().unwrap();

        assert_eq!(receiver.drain(), 0);

        sender.wake().unwrap();
        sender.clone().wake().unwrap();
        assert_eq!(receiver.drain(), 2);
        assert_eq!(receiver.drain(), 0);
    }

    #[test]
    fn drain_consumes_bursts_larger_than_a_chunk() {
        let (sender, receiver) = make_wake_pipe().unwrap();

        for _ in 0..(DRAIN_CHUNK * 3 + 1) {
            sender.wake().unwrap();
        }
        assert_eq!(receiver.drain(), DRAIN_CHUNK * 3 + 1);
        assert_eq!(receiver.drain(), 0);
    }

    #[test]
    fn full_pipe_is_not_an_error() {
        let (sender, receiver) = make_wake_pipe().unwrap();

        // Fill the pipe until the kernel refuses more bytes.
        loop {
            match rustix::io::write(&sender, &[0u8; 4096]) {
                Ok(_) => continue,
                Err(Errno::AGAIN) => break,
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }
        sender.wake().unwrap();

        assert!(receiver.drain() > 0);
    }

    #[test]
    fn closed_reader_fails() {
        let (sender, receiver) = make_wake_pipe().unwrap();
        drop(receiver);

        // Rust ignores SIGPIPE, so the write reports EPIPE.
        assert!(matches!(sender.wake(), Err(Error::Wake(_))));
    }
}
