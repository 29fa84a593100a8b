//! Tick-ordered queue of the snapshots waiting to be played back.
use crate::error::{Result, SmoothingError};
use alloc::collections::VecDeque;
use bevy_reflect::Reflect;
use tick_smoother_core::pose::Pose;
use tick_smoother_core::tick::Tick;
use tracing::{debug, trace};

/// How many snapshots we tolerate above the interpolation target before evicting the oldest ones
pub const OVERFLOW_MARGIN: usize = 3;

/// Authoritative pose stamped with the tick it was produced for
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct TickSnapshot {
    pub tick: Tick,
    pub pose: Pose,
}

impl TickSnapshot {
    pub fn new(tick: Tick, pose: Pose) -> Self {
        Self { tick, pose }
    }
}

/// Queue of snapshots waiting to be played back.
///
/// The front contains the oldest snapshot (the one currently being moved towards), the back
/// contains the most recent one. Ticks are strictly increasing from front to back.
///
/// Snapshots that are still in the buffer can be replaced in place when a replay produces a
/// corrected pose for their tick.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SnapshotBuffer {
    buffer: VecDeque<TickSnapshot>,
}

impl SnapshotBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Snapshot currently being moved towards
    pub fn head(&self) -> Option<&TickSnapshot> {
        self.buffer.front()
    }

    /// Most recent snapshot in the buffer
    pub fn newest(&self) -> Option<&TickSnapshot> {
        self.buffer.back()
    }

    pub fn get(&self, tick: Tick) -> Option<&TickSnapshot> {
        self.index_of(tick).and_then(|index| self.buffer.get(index))
    }

    /// Add a snapshot at the back of the buffer.
    ///
    /// Returns true if the snapshot is the only entry in the buffer, in which case a new
    /// playback segment has to be started towards it.
    ///
    /// A snapshot for the same tick as the most recent one replaces it; an older snapshot is
    /// rejected.
    pub fn enqueue(&mut self, snapshot: TickSnapshot) -> Result<bool> {
        if !snapshot.pose.is_valid() {
            return Err(SmoothingError::InvalidPose);
        }
        if let Some(newest) = self.buffer.back_mut() {
            if newest.tick == snapshot.tick {
                debug!(
                    tick = ?snapshot.tick,
                    "snapshot buffer already had a value for that tick, replacing it"
                );
                *newest = snapshot;
                return Ok(false);
            }
            if newest.tick > snapshot.tick {
                return Err(SmoothingError::StaleTick {
                    tick: snapshot.tick,
                    last: newest.tick,
                });
            }
        }
        self.buffer.push_back(snapshot);
        Ok(self.buffer.len() == 1)
    }

    /// Remove the snapshot at the head of the buffer
    pub fn dequeue(&mut self) -> Option<TickSnapshot> {
        self.buffer.pop_front()
    }

    /// Evict the oldest snapshots while the buffer holds more than
    /// `max_depth + OVERFLOW_MARGIN` entries.
    ///
    /// Evicted snapshots are never rendered. Returns the most recent evicted snapshot, which
    /// becomes the starting point of the segment towards the new head.
    pub fn discard_excess(&mut self, max_depth: usize) -> Option<TickSnapshot> {
        let limit = max_depth + OVERFLOW_MARGIN;
        let mut last_discarded = None;
        while self.buffer.len() > limit {
            last_discarded = self.buffer.pop_front();
        }
        if let Some(discarded) = &last_discarded {
            debug!(up_to = ?discarded.tick, ?limit, "discarded excess snapshots");
        }
        last_discarded
    }

    /// Replace the pose of the snapshot buffered for `tick`.
    ///
    /// Returns false if that tick is not buffered (anymore): a correction that arrives after
    /// the snapshot was consumed is dropped.
    pub fn replace_at(&mut self, tick: Tick, pose: Pose) -> bool {
        if !pose.is_valid() {
            return false;
        }
        let Some(index) = self.index_of(tick) else {
            trace!(?tick, "tick is not buffered, dropping correction");
            return false;
        };
        self.buffer[index].pose = pose;
        true
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn index_of(&self, tick: Tick) -> Option<usize> {
        let first_tick = self.buffer.front()?.tick;
        let offset = tick - first_tick;
        if offset < 0 {
            return None;
        }
        // ticks are usually contiguous, so the offset from the head is the index
        let index = offset as usize;
        if self.buffer.get(index).is_some_and(|snapshot| snapshot.tick == tick) {
            return Some(index);
        }
        self.buffer
            .binary_search_by(|snapshot| snapshot.tick.cmp(&tick))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_math::Vec3;
    use test_log::test;

    fn snapshot(tick: u32, x: f32) -> TickSnapshot {
        TickSnapshot::new(Tick(tick), Pose::from_position(Vec3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn test_enqueue_dequeue_order() {
        let mut buffer = SnapshotBuffer::new();
        assert_eq!(buffer.enqueue(snapshot(10, 0.0)), Ok(true));
        assert_eq!(buffer.enqueue(snapshot(11, 1.0)), Ok(false));
        assert_eq!(buffer.enqueue(snapshot(12, 2.0)), Ok(false));
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.head().map(|s| s.tick), Some(Tick(10)));
        assert_eq!(buffer.newest().map(|s| s.tick), Some(Tick(12)));

        let ticks: Vec<_> = core::iter::from_fn(|| buffer.dequeue().map(|s| s.tick)).collect();
        assert_eq!(ticks, vec![Tick(10), Tick(11), Tick(12)]);
        assert!(buffer.is_empty());
        // the next enqueue is the first entry again
        assert_eq!(buffer.enqueue(snapshot(13, 3.0)), Ok(true));
    }

    #[test]
    fn test_enqueue_malformed() {
        let mut buffer = SnapshotBuffer::new();
        buffer.enqueue(snapshot(10, 0.0)).unwrap();
        buffer.enqueue(snapshot(11, 1.0)).unwrap();

        // same tick: replaces the most recent entry
        assert_eq!(buffer.enqueue(snapshot(11, 5.0)), Ok(false));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.newest().unwrap().pose.position.x, 5.0);

        // older tick: rejected
        assert_eq!(
            buffer.enqueue(snapshot(9, 0.0)),
            Err(SmoothingError::StaleTick {
                tick: Tick(9),
                last: Tick(11)
            })
        );
        // invalid pose: rejected
        let nan = TickSnapshot::new(Tick(12), Pose::from_position(Vec3::NAN));
        assert_eq!(buffer.enqueue(nan), Err(SmoothingError::InvalidPose));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_discard_excess_bounds_depth() {
        let mut buffer = SnapshotBuffer::new();
        for max_depth in [0, 1, 2, 5] {
            buffer.clear();
            for tick in 0..20 {
                buffer.enqueue(snapshot(100 + tick, tick as f32)).unwrap();
                buffer.discard_excess(max_depth);
                assert!(buffer.len() <= max_depth + OVERFLOW_MARGIN);
            }
        }
    }

    #[test]
    fn test_discard_excess_returns_newest_discarded() {
        let mut buffer = SnapshotBuffer::new();
        for tick in 0..8 {
            buffer.enqueue(snapshot(tick, tick as f32)).unwrap();
        }
        // limit is 2 + 3 = 5: ticks 0, 1, 2 are discarded
        let discarded = buffer.discard_excess(2).unwrap();
        assert_eq!(discarded.tick, Tick(2));
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.head().unwrap().tick, Tick(3));

        // nothing to discard
        assert_eq!(buffer.discard_excess(2), None);
    }

    #[test]
    fn test_replace_at() {
        let mut buffer = SnapshotBuffer::new();
        for tick in 100..104 {
            buffer.enqueue(snapshot(tick, tick as f32)).unwrap();
        }
        let corrected = Pose::from_position(Vec3::new(5.0, 0.0, 0.0));
        assert!(buffer.replace_at(Tick(101), corrected));
        let once = buffer.clone();
        // idempotent
        assert!(buffer.replace_at(Tick(101), corrected));
        assert_eq!(buffer, once);
        assert_eq!(buffer.get(Tick(101)).unwrap().pose, corrected);

        // tick already consumed
        buffer.dequeue();
        buffer.dequeue();
        assert!(!buffer.replace_at(Tick(101), corrected));
        // tick not received yet
        assert!(!buffer.replace_at(Tick(110), corrected));
        // invalid correction
        assert!(!buffer.replace_at(Tick(102), Pose::INVALID));
        assert_eq!(buffer.get(Tick(102)).unwrap().pose.position.x, 102.0);
    }

    #[test]
    fn test_replace_at_with_gap() {
        let mut buffer = SnapshotBuffer::new();
        buffer.enqueue(snapshot(10, 0.0)).unwrap();
        buffer.enqueue(snapshot(12, 2.0)).unwrap();
        buffer.enqueue(snapshot(13, 3.0)).unwrap();
        let corrected = Pose::from_position(Vec3::Y);
        assert!(buffer.replace_at(Tick(13), corrected));
        assert!(!buffer.replace_at(Tick(11), corrected));
        assert_eq!(buffer.get(Tick(13)).unwrap().pose, corrected);
    }
}
