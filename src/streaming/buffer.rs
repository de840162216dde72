//! Sparse per-channel frame buffer keyed by `(target, frame)`.

use std::collections::BTreeMap;

/// Identity of one buffered frame or keyframe.
///
/// Ordered by target first, so the frames of one target form a contiguous
/// range in ascending presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameKey {
    pub target: usize,
    pub frame: u32,
}

impl FrameKey {
    pub fn new(target: usize, frame: u32) -> Self {
        Self { target, frame }
    }
}

/// Target indices to try for a lookup, nearest to `preferred` first.
///
/// `preferred, preferred - 1, preferred + 1, preferred - 2, ...`
pub fn fallback_order(preferred: usize, len: usize) -> impl Iterator<Item = usize> {
    let preferred = preferred.min(len.saturating_sub(1));
    (0..len).flat_map(move |distance| {
        let below = preferred.checked_sub(distance);
        let above = Some(preferred + distance).filter(|t| distance > 0 && *t < len);
        below.into_iter().chain(above)
    })
}

#[derive(Debug, Clone)]
pub struct FrameBuffer<P> {
    frames: BTreeMap<FrameKey, P>,
}

impl<P> Default for FrameBuffer<P> {
    fn default() -> Self {
        Self {
            frames: BTreeMap::new(),
        }
    }
}

impl<P> FrameBuffer<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: FrameKey, payload: P) -> Option<P> {
        self.frames.insert(key, payload)
    }

    pub fn get(&self, key: &FrameKey) -> Option<&P> {
        self.frames.get(key)
    }

    pub fn contains(&self, key: &FrameKey) -> bool {
        self.frames.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &FrameKey> {
        self.frames.keys()
    }

    /// Drops every entry, returning how many were released.
    pub fn clear(&mut self) -> usize {
        let released = self.frames.len();
        self.frames.clear();
        released
    }

    /// Finds a frame for `preferred`, falling back to the nearest other target.
    ///
    /// `frame_for` maps a target index to the frame index wanted from it, so
    /// targets with different frame rates can be searched for the same time.
    pub fn find(
        &self,
        preferred: usize,
        targets: usize,
        mut frame_for: impl FnMut(usize) -> Option<u32>,
    ) -> Option<(FrameKey, &P)> {
        fallback_order(preferred, targets).find_map(|target| {
            let key = FrameKey::new(target, frame_for(target)?);
            self.frames.get(&key).map(|payload| (key, payload))
        })
    }

    /// Removes frames of `target` presented before `cutoff` seconds.
    ///
    /// Scans forward from the oldest frame and stops at the first one still
    /// inside the window.
    pub fn evict_before(&mut self, target: usize, frame_rate: f64, cutoff: f64) -> usize {
        let stale: Vec<FrameKey> = self
            .frames
            .range(FrameKey::new(target, 0)..=FrameKey::new(target, u32::MAX))
            .map(|(key, _)| *key)
            .take_while(|key| (key.frame as f64) / frame_rate < cutoff)
            .collect();
        for key in &stale {
            self.frames.remove(key);
        }
        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_prefers_nearest_index() {
        assert_eq!(fallback_order(2, 5).collect::<Vec<_>>(), vec![2, 1, 3, 0, 4]);
        assert_eq!(fallback_order(0, 3).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(fallback_order(3, 4).collect::<Vec<_>>(), vec![3, 2, 1, 0]);
        assert_eq!(fallback_order(0, 1).collect::<Vec<_>>(), vec![0]);
        assert_eq!(fallback_order(0, 0).count(), 0);
    }

    #[test]
    fn find_falls_back_across_targets() {
        let mut buffer = FrameBuffer::new();
        buffer.insert(FrameKey::new(0, 5), "low-5");
        buffer.insert(FrameKey::new(1, 4), "mid-4");
        buffer.insert(FrameKey::new(1, 6), "mid-6");

        let (key, payload) = buffer.find(1, 3, |_| Some(5)).unwrap();
        assert_eq!(key, FrameKey::new(0, 5));
        assert_eq!(*payload, "low-5");

        assert!(buffer.find(1, 3, |_| Some(7)).is_none());
        assert!(buffer.find(1, 3, |_| None).is_none());
    }

    #[test]
    fn eviction_is_per_target_and_oldest_first() {
        let mut buffer = FrameBuffer::new();
        for frame in 0..10 {
            buffer.insert(FrameKey::new(0, frame), frame);
            buffer.insert(FrameKey::new(1, frame), frame);
        }
        // 10 fps: frames 0..=4 end before 0.5s.
        assert_eq!(buffer.evict_before(0, 10.0, 0.5), 5);
        assert_eq!(buffer.len(), 15);
        assert!(!buffer.contains(&FrameKey::new(0, 4)));
        assert!(buffer.contains(&FrameKey::new(0, 5)));
        assert!(buffer.contains(&FrameKey::new(1, 0)));
        assert_eq!(buffer.evict_before(0, 10.0, 0.5), 0);
        assert_eq!(buffer.clear(), 15);
        assert!(buffer.is_empty());
    }
}
