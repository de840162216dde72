//! Per-channel quality ladder and buffer-health bookkeeping.

use super::manifest::{GeometryFormat, TextureFormat};

/// Fetch time / gained seconds at or above which a channel steps down.
pub const STEP_DOWN_METRIC: f64 = 0.3;
/// Fetch time / gained seconds below which a channel steps up.
pub const STEP_UP_METRIC: f64 = 0.2;

/// Encoding of a single quality target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Geometry(GeometryFormat),
    Texture(TextureFormat),
}

/// Segment layout of a uniform-solve geometry target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentLayout {
    /// Keyframes per segment file.
    pub frame_count: u32,
    /// Seconds covered by one segment.
    pub duration: f64,
}

/// One rung of a quality ladder, as resolved from the manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetInfo {
    pub name: String,
    pub format: TargetFormat,
    pub frame_rate: f64,
    pub frame_count: u32,
    pub total_size: Option<u64>,
    pub segment: Option<SegmentLayout>,
}

impl TargetInfo {
    /// Presentation time of a frame index.
    pub fn frame_time(&self, frame: u32) -> f64 {
        frame as f64 / self.frame_rate
    }

    pub fn last_frame(&self) -> u32 {
        self.frame_count.saturating_sub(1)
    }
}

/// Outcome of one adaptation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adaptation {
    Held,
    SteppedDown,
    SteppedUp,
    /// A user override pinned the target.
    Pinned,
}

/// Quality ladder plus buffer bookkeeping for one geometry or texture channel.
///
/// `buffer_health` is the lookahead: seconds fetched ahead of the playhead.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChannelInfo {
    /// Sorted cheapest first.
    pub targets: Vec<TargetInfo>,
    /// `None` means automatic selection.
    pub user_target: Option<usize>,
    pub current_target: usize,
    pub buffer_health: f64,
    pub pending_requests: usize,
}

impl StreamChannelInfo {
    pub fn new(targets: Vec<TargetInfo>) -> Self {
        Self {
            targets,
            user_target: None,
            current_target: 0,
            buffer_health: 0.0,
            pending_requests: 0,
        }
    }

    pub fn current(&self) -> &TargetInfo {
        &self.targets[self.current_target]
    }

    /// Adjusts `current_target` from a batch throughput metric.
    pub fn adapt(&mut self, metric: f64) -> Adaptation {
        let last = self.targets.len().saturating_sub(1);
        if let Some(user) = self.user_target {
            self.current_target = user.min(last);
            return Adaptation::Pinned;
        }
        if metric >= STEP_DOWN_METRIC {
            if self.current_target > 0 {
                self.current_target -= 1;
                return Adaptation::SteppedDown;
            }
        } else if metric < STEP_UP_METRIC && self.current_target < last {
            self.current_target += 1;
            return Adaptation::SteppedUp;
        }
        Adaptation::Held
    }

    /// Sets or clears the manual override; applied at once.
    pub fn set_user_target(&mut self, target: Option<usize>) {
        self.user_target = target.map(|t| t.min(self.targets.len().saturating_sub(1)));
        if let Some(t) = self.user_target {
            self.current_target = t;
        }
    }

    /// Adds fetched seconds, never exceeding `cap`. Returns what was added.
    pub fn add_health(&mut self, seconds: f64, cap: f64) -> f64 {
        let cap = cap.max(0.0);
        if self.buffer_health >= cap {
            return 0.0;
        }
        let after = (self.buffer_health + seconds.max(0.0)).min(cap);
        let added = after - self.buffer_health;
        self.buffer_health = after;
        added
    }

    /// Removes played seconds, never going below zero.
    pub fn consume(&mut self, seconds: f64) {
        self.buffer_health = (self.buffer_health - seconds.max(0.0)).max(0.0);
    }

    pub fn reset(&mut self) {
        self.buffer_health = 0.0;
        self.pending_requests = 0;
    }
}
