//! fibers-poll, a bounded-buffer readiness collector
//!
//! This crate is the I/O readiness layer of a cooperative fiber runtime. It
//! wraps one OS readiness multiplexer (epoll, kqueue, event ports, through
//! the `polling` crate) and reports, for each loop iteration, which watched
//! descriptors became ready. Results are written as fixed-size
//! `(descriptor, mask)` records into a buffer of fixed capacity, so that a
//! runtime can read them without allocation and without the collector ever
//! growing behind its back.
//!
//! Deciding which fiber to resume, and when to block, is left to the
//! runtime. The collector only provides the hooks it needs: a [`WaitHook`]
//! called around blocking waits, and a wake pipe that lets another thread
//! interrupt a blocked iteration.
//!
//! ## How to use it
//!
//! ```no_run
//! use std::os::unix::io::AsFd;
//! use std::os::unix::net::UnixStream;
//!
//! use fibers_poll::{make_wake_pipe, EventBase, EventBuffer, EventMask};
//!
//! # fn main() -> fibers_poll::Result<()> {
//! let (wake, woke) = make_wake_pipe()?;
//! let (_tx, rx) = UnixStream::pair()?;
//!
//! // One record per watch: the wake pipe and the stream.
//! let mut base = EventBase::new(EventBuffer::with_capacity(2))?;
//!
//! // SAFETY: both descriptors outlive the event base.
//! unsafe {
//!     base.add_watch(&woke, EventMask::READ | EventMask::PERSIST)?;
//!     base.add_watch(&rx, EventMask::IMPL_READ | EventMask::PERSIST)?;
//! }
//!
//! // Wait for at most one second (timeouts are in nanoseconds by default).
//! let ready = base.run_once(wake.as_fd(), woke.as_fd(), 1_000_000_000)?;
//! for record in &base.events()[..ready] {
//!     println!("fd {} is ready: {:?}", record.fd, record.mask());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Buffer layout
//!
//! Records are `#[repr(C)]` and [`EventBuffer::as_bytes`] exposes them
//! directly. A runtime interpreting the raw bytes finds each record every
//! [`RECORD_SIZE`] bytes, the descriptor as a native-endian `i32` at offset
//! zero and the mask as a native-endian `u16` at [`MASK_OFFSET`].

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::needless_doctest_main)]

pub use crate::buffer::{EventBuffer, EventRecord, MASK_OFFSET, RECORD_SIZE};
pub use crate::error::{Error, Result};
pub use crate::event_base::{Config, EventBase};
pub use crate::hook::{NoWaitHook, WaitHook};
pub use crate::mask::EventMask;
pub use crate::sys::Readiness;
pub use crate::time::{TimeUnits, Timeout};
pub use crate::token::WatchToken;
pub use crate::wake::{drain, make_wake_pipe, wake, WakeReceiver, WakeSender};

mod buffer;
mod error;
mod event_base;
pub mod hook;
mod mask;
mod sys;
mod time;
mod token;
pub mod wake;
