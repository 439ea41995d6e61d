//! Identifiers for connections and the logical streams they carry.
//!
//! Connection identifiers are allocated by the pool and are unique for the
//! lifetime of a dispatcher. Stream identifiers are allocated by their owning
//! connection: client-initiated streams use odd numbers starting at one and are
//! never reused on that connection.

/// Identifier assigned to a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub fn new(id: u64) -> Self { Self(id) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

/// Identifier of one logical stream on a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u32);

impl StreamId {
    /// Largest identifier a stream may carry.
    pub const MAX: StreamId = StreamId(0x7fff_ffff);

    /// First identifier handed out on a fresh connection.
    pub const FIRST_CLIENT: StreamId = StreamId(1);

    /// Create a new [`StreamId`] with the provided value.
    #[must_use]
    pub const fn new(id: u32) -> Self { Self(id) }

    /// Return the inner `u32` representation.
    #[must_use]
    pub const fn as_u32(&self) -> u32 { self.0 }

    /// Identifier following this one for the same initiator, if any remain.
    #[must_use]
    pub fn next_client(self) -> Option<StreamId> {
        self.0
            .checked_add(2)
            .filter(|next| *next <= Self::MAX.0)
            .map(StreamId)
    }
}

impl From<u32> for StreamId {
    fn from(value: u32) -> Self { Self(value) }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}
