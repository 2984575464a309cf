// Versioned handles into the watch registry.
//
// Registry slots are reused once a watch is removed, so a slot index alone
// cannot tell a live watch from a stale handle. Each insertion gets a fresh
// version and a handle is only valid while its slot carries that version.

/// A token identifying a watch registered in an [`EventBase`](crate::EventBase).
///
/// It is handed out by [`EventBase::add_watch`](crate::EventBase::add_watch)
/// and is the only way to remove that watch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchToken {
    pub(crate) key: usize,
    pub(crate) version: u32,
}

/// Hands out watch versions, wrapping around on overflow.
#[derive(Debug, Default)]
pub(crate) struct VersionCounter {
    next: u32,
}

impl VersionCounter {
    pub(crate) fn next(&mut self) -> u32 {
        let version = self.next;
        self.next = self.next.wrapping_add(1);
        version
    }
}
