//! Serial-number fences.
//!
//! The host stamps every request and event with a monotonically increasing
//! serial. A fence remembers the serial of one outgoing request; events that
//! carry an older serial were generated before the request took effect.

use serde::{Deserialize, Serialize};

/// Host-assigned sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Serial(pub u64);

impl Serial {
    /// Wrapping-aware "happened before".
    #[allow(clippy::cast_possible_wrap)]
    pub const fn precedes(self, other: Self) -> bool {
        (self.0.wrapping_sub(other.0) as i64) < 0
    }
}

impl std::fmt::Display for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A one-shot fence on a request serial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialFence {
    serial: Option<Serial>,
}

impl SerialFence {
    pub const fn new() -> Self {
        Self { serial: None }
    }

    /// Arm the fence at `serial`, replacing any previous one.
    pub fn arm(&mut self, serial: Serial) {
        self.serial = Some(serial);
    }

    pub const fn is_armed(&self) -> bool {
        self.serial.is_some()
    }

    pub const fn serial(&self) -> Option<Serial> {
        self.serial
    }

    /// Check `serial` against the fence.
    ///
    /// Returns true for events older than the fence. The first event at or
    /// past the fence clears it.
    pub fn is_stale(&mut self, serial: Serial) -> bool {
        let Some(fence) = self.serial else {
            return false;
        };
        if serial.precedes(fence) {
            return true;
        }
        self.serial = None;
        false
    }

    /// Like [`is_stale`](Self::is_stale) but never clears the fence.
    pub fn precedes(&self, serial: Serial) -> bool {
        self.serial.is_some_and(|fence| serial.precedes(fence))
    }

    pub fn clear(&mut self) {
        self.serial = None;
    }
}
