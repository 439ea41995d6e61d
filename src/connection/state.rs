//! Connection lifecycle state shared between the actor and the pool.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a pooled connection.
///
/// States only move forward: `Active` to `Draining` to `Closed`, or straight
/// from `Active` to `Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Accepting new streams.
    Active = 0,
    /// Finishing existing streams; never handed out again.
    Draining = 1,
    /// Torn down.
    Closed = 2,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Active,
            1 => Self::Draining,
            _ => Self::Closed,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Closed => "closed",
        }
    }
}

/// Atomic cell holding a [`ConnectionState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) const fn new() -> Self { Self(AtomicU8::new(ConnectionState::Active as u8)) }

    pub(crate) fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `to` unless the cell is already there or beyond.
    ///
    /// Returns the previous state when a transition happened.
    pub(crate) fn advance(&self, to: ConnectionState) -> Option<ConnectionState> {
        let previous = ConnectionState::from_u8(self.0.fetch_max(to as u8, Ordering::AcqRel));
        (previous < to).then_some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_never_move_backwards() {
        let cell = StateCell::new();
        assert_eq!(cell.advance(ConnectionState::Draining), Some(ConnectionState::Active));
        assert_eq!(cell.advance(ConnectionState::Active), None);
        assert_eq!(cell.advance(ConnectionState::Draining), None);
        assert_eq!(cell.load(), ConnectionState::Draining);
        assert_eq!(cell.advance(ConnectionState::Closed), Some(ConnectionState::Draining));
        assert_eq!(cell.load(), ConnectionState::Closed);
    }

    #[test]
    fn active_may_close_directly() {
        let cell = StateCell::new();
        assert_eq!(cell.advance(ConnectionState::Closed), Some(ConnectionState::Active));
    }
}
