//! Shutdown notifications received from the peer.

use crate::session::StreamId;

/// Effect of one shutdown notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct GoAwayOutcome {
    /// Watermark in force after the notification.
    pub(super) watermark: StreamId,
    /// Whether this was the first notification on the connection.
    pub(super) first: bool,
    /// Whether the watermark moved down.
    pub(super) tightened: bool,
}

/// Tracks the effective watermark of a connection.
///
/// The watermark only ever decreases: a later notification with a higher
/// last-processed id leaves it unchanged.
#[derive(Debug, Default)]
pub(super) struct GoAwayTracker {
    watermark: Option<StreamId>,
}

impl GoAwayTracker {
    pub(super) fn apply(&mut self, last_processed: StreamId) -> GoAwayOutcome {
        let previous = self.watermark;
        let watermark = previous.map_or(last_processed, |current| current.min(last_processed));
        self.watermark = Some(watermark);
        GoAwayOutcome {
            watermark,
            first: previous.is_none(),
            tightened: previous.is_some_and(|current| watermark < current),
        }
    }

    #[cfg(test)]
    pub(super) const fn watermark(&self) -> Option<StreamId> { self.watermark }

    /// Whether `stream` may still complete.
    pub(super) fn permits(&self, stream: StreamId) -> bool {
        self.watermark.is_none_or(|watermark| stream <= watermark)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn first_notification_sets_the_watermark() {
        let mut tracker = GoAwayTracker::default();
        let outcome = tracker.apply(StreamId::new(5));
        assert!(outcome.first);
        assert!(!outcome.tightened);
        assert_eq!(tracker.watermark(), Some(StreamId::new(5)));
        assert!(tracker.permits(StreamId::new(5)));
        assert!(!tracker.permits(StreamId::new(7)));
    }

    #[test]
    fn higher_watermark_is_ignored() {
        let mut tracker = GoAwayTracker::default();
        tracker.apply(StreamId::new(3));
        let outcome = tracker.apply(StreamId::new(9));
        assert!(!outcome.first);
        assert!(!outcome.tightened);
        assert_eq!(outcome.watermark, StreamId::new(3));
    }

    proptest! {
        #[test]
        fn watermark_is_the_minimum_received(
            watermarks in proptest::collection::vec(0u32..1000, 1..16),
            stream in 0u32..1000,
        ) {
            let mut tracker = GoAwayTracker::default();
            for watermark in &watermarks {
                tracker.apply(StreamId::new(*watermark));
            }
            let min = watermarks.iter().copied().min().expect("non-empty");
            prop_assert_eq!(tracker.watermark(), Some(StreamId::new(min)));
            prop_assert_eq!(tracker.permits(StreamId::new(stream)), stream <= min);
        }
    }
}
