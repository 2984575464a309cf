//! The bounded record buffer
//!
//! An [`EventBuffer`] is the storage one loop iteration writes into. Its
//! capacity is fixed when it is created: running out of room is an error,
//! never a reallocation, so the caller must size it for the number of
//! watches it registers.

use std::mem;
use std::os::unix::io::RawFd;

use crate::{Error, EventMask};

/// One ready descriptor, as laid out in the buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct EventRecord {
    /// The descriptor that became ready.
    pub fd: RawFd,
    /// The raw bits of the [`EventMask`] reported for it.
    pub mask: u16,
    _pad: u16,
}

/// Size in bytes of one [`EventRecord`].
pub const RECORD_SIZE: usize = mem::size_of::<EventRecord>();

/// Offset in bytes of the mask field inside an [`EventRecord`].
pub const MASK_OFFSET: usize = mem::offset_of!(EventRecord, mask);

impl EventRecord {
    /// Create a record for `fd` with the given mask.
    pub fn new(fd: RawFd, mask: EventMask) -> EventRecord {
        EventRecord {
            fd,
            mask: mask.bits(),
            _pad: 0,
        }
    }

    /// The reported conditions.
    pub fn mask(&self) -> EventMask {
        EventMask::from_bits_truncate(self.mask)
    }
}

/// A fixed-capacity buffer of [`EventRecord`]s.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    records: Box<[EventRecord]>,
    len: usize,
}

impl EventBuffer {
    /// Create a buffer holding at most `capacity` records.
    pub fn with_capacity(capacity: usize) -> EventBuffer {
        EventBuffer {
            records: vec![EventRecord::default(); capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Create a buffer sized for a byte region of `bytes` bytes.
    ///
    /// Trailing bytes that cannot hold a whole record are not used.
    pub fn for_byte_len(bytes: usize) -> EventBuffer {
        Self::with_capacity(bytes / RECORD_SIZE)
    }

    /// Maximum number of records.
    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Number of records filled so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no record has been filled.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The filled records, in the order they were pushed.
    pub fn records(&self) -> &[EventRecord] {
        &self.records[..self.len]
    }

    /// Reset the fill cursor.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append a record, failing if the buffer is already full.
    pub fn push(&mut self, fd: RawFd, mask: EventMask) -> crate::Result<()> {
        let capacity = self.capacity();
        let slot = self
            .records
            .get_mut(self.len)
            .ok_or(Error::BufferFull { fd, capacity })?;
        *slot = EventRecord::new(fd, mask);
        self.len += 1;
        Ok(())
    }

    /// Remove every record for `fd`, shifting later records left.
    ///
    /// Returns how many records were removed.
    pub fn remove_fd(&mut self, fd: RawFd) -> usize {
        let mut kept = 0;
        for i in 0..self.len {
            if self.records[i].fd != fd {
                self.records[kept] = self.records[i];
                kept += 1;
            }
        }
        let removed = self.len - kept;
        self.len = kept;
        removed
    }

    /// The whole buffer as raw bytes, [`RECORD_SIZE`] bytes per record.
    ///
    /// Only the first `len() * RECORD_SIZE` bytes hold results of the last
    /// iteration.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: EventRecord is repr(C) with no implicit padding (the pad
        // field is explicit and always initialized), so every byte of the
        // slice is initialized.
        unsafe {
            std::slice::from_raw_parts(
                self.records.as_ptr().cast::<u8>(),
                self.records.len() * RECORD_SIZE,
            )
        }
    }
}
