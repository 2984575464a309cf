//! Readiness masks
//!
//! The bit values match libevent's `EV_*` flags so that a host runtime
//! already speaking that vocabulary can interpret records without a
//! translation table.

bitflags::bitflags! {
    /// Conditions a watch is interested in, or that were reported ready.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct EventMask: u16 {
        /// A timeout expired. Never requested, kept for layout compatibility.
        const TIMEOUT = 0x01;
        /// The descriptor is readable.
        const READ = 0x02;
        /// The descriptor is writable.
        const WRITE = 0x04;
        /// The watch stays armed after firing.
        const PERSIST = 0x10;
        /// The peer closed its end of the connection.
        const CLOSED = 0x80;

        /// What a logical "readable" condition is reported as.
        const IMPL_READ = Self::READ.bits() | Self::CLOSED.bits();
        /// What a logical "writable" condition is reported as.
        const IMPL_WRITE = Self::WRITE.bits();
        /// What a hang-up or error condition is reported as.
        const IMPL_CLOSED_OR_ERROR = Self::READ.bits() | Self::WRITE.bits();
    }
}

impl EventMask {
    /// The conditions that can actually be reported for this mask.
    pub fn conditions(self) -> EventMask {
        self & (EventMask::READ | EventMask::WRITE | EventMask::CLOSED)
    }

    /// Whether a watch with this mask re-arms after firing.
    pub fn is_persistent(self) -> bool {
        self.contains(EventMask::PERSIST)
    }
}

impl From<crate::Readiness> for EventMask {
    fn from(readiness: crate::Readiness) -> EventMask {
        let mut mask = EventMask::empty();
        if readiness.readable {
            mask |= EventMask::READ;
        }
        if readiness.writable {
            mask |= EventMask::WRITE;
        }
        if readiness.closed {
            mask |= EventMask::CLOSED;
        }
        if readiness.error {
            mask |= EventMask::IMPL_CLOSED_OR_ERROR;
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Readiness;

    #[test]
    fn libevent_bit_values() {
        assert_eq!(EventMask::READ.bits(), 0x02);
        assert_eq!(EventMask::WRITE.bits(), 0x04);
        assert_eq!(EventMask::PERSIST.bits(), 0x10);
        assert_eq!(EventMask::CLOSED.bits(), 0x80);
        assert_eq!(EventMask::IMPL_READ.bits(), 0x82);
        assert_eq!(EventMask::IMPL_WRITE.bits(), 0x04);
        assert_eq!(EventMask::IMPL_CLOSED_OR_ERROR.bits(), 0x06);
    }

    #[test]
    fn conditions_drop_persist() {
        let mask = EventMask::READ | EventMask::PERSIST;
        assert!(mask.is_persistent());
        assert_eq!(mask.conditions(), EventMask::READ);
    }

    #[test]
    fn error_reports_both_directions() {
        let readiness = Readiness {
            error: true,
            ..Readiness::EMPTY
        };
        assert_eq!(EventMask::from(readiness), EventMask::READ | EventMask::WRITE);
    }
}
