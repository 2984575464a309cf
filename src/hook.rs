//! Scheduler integration around blocking waits
//!
//! A fiber runtime needs to know when its thread is about to sleep in the
//! poller, so that it can wake it through the wake descriptor rather than
//! assume it is running. The event base calls a [`WaitHook`] before and
//! after every wait that may block.

use std::os::unix::io::BorrowedFd;

/// Callbacks surrounding a potentially blocking wait.
pub trait WaitHook {
    /// Called before waiting, with the descriptor that will interrupt the
    /// wait.
    ///
    /// Return `true` if an interruption is already pending. The wait is then
    /// skipped and the iteration reports no events; `wait_finished` is not
    /// called.
    fn prepare_to_wait(&mut self, wake_fd: BorrowedFd<'_>) -> bool;

    /// Called once the wait has returned.
    fn wait_finished(&mut self);
}

/// A hook that never interrupts and has nothing to clean up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWaitHook;

impl WaitHook for NoWaitHook {
    fn prepare_to_wait(&mut self, _: BorrowedFd<'_>) -> bool {
        false
    }

    fn wait_finished(&mut self) {}
}
