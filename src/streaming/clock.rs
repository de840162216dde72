//! Anchored playback clock.

/// Media clock derived from a wall-clock anchor.
///
/// While playing, `current_time = media_start_time + (now - playback_start_date) * playback_rate`.
/// Re-anchoring rewrites both anchor fields so that resuming never jumps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackClock {
    pub media_start_time: f64,
    /// Wall-clock seconds at which `media_start_time` began playing.
    pub playback_start_date: f64,
    pub playback_rate: f64,
    pub current_time: f64,
    pub duration: f64,
}

impl PlaybackClock {
    pub fn new(duration: f64, now: f64) -> Self {
        Self {
            media_start_time: 0.0,
            playback_start_date: now,
            playback_rate: 1.0,
            current_time: 0.0,
            duration,
        }
    }

    /// Restarts the wall-clock formula from the current media time.
    pub fn anchor(&mut self, now: f64) {
        self.media_start_time = self.current_time;
        self.playback_start_date = now;
    }

    pub fn wall_time(&self, now: f64) -> f64 {
        self.media_start_time + (now - self.playback_start_date) * self.playback_rate
    }

    /// Changes the rate from `current_time` on.
    ///
    /// `current_time` must already hold the playhead at `now`; time played at
    /// the old rate is not recomputed.
    pub fn set_rate(&mut self, rate: f64, now: f64) {
        if rate != self.playback_rate {
            self.anchor(now);
            self.playback_rate = rate;
        }
    }

    pub fn seek(&mut self, time: f64, now: f64) {
        self.current_time = time.clamp(0.0, self.duration);
        self.anchor(now);
    }

    pub fn remaining(&self) -> f64 {
        (self.duration - self.current_time).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_prevents_jumps() {
        let mut clock = PlaybackClock::new(10.0, 100.0);
        clock.anchor(100.0);
        clock.current_time = clock.wall_time(102.0);
        assert_eq!(clock.current_time, 2.0);
        // Stalled for five seconds, then resumed.
        clock.anchor(107.0);
        assert_eq!(clock.wall_time(107.0), 2.0);
        assert_eq!(clock.wall_time(108.0), 3.0);
    }

    #[test]
    fn rate_scales_elapsed_time() {
        let mut clock = PlaybackClock::new(10.0, 0.0);
        clock.set_rate(2.0, 0.0);
        assert_eq!(clock.wall_time(1.5), 3.0);
        clock.current_time = clock.wall_time(1.0);
        clock.set_rate(1.0, 1.0);
        assert_eq!(clock.wall_time(2.0), 3.0);
    }

    #[test]
    fn set_rate_keeps_the_playhead() {
        let mut clock = PlaybackClock::new(10.0, 0.0);
        clock.current_time = clock.wall_time(1.0);
        clock.set_rate(2.0, 1.0);
        assert_eq!(clock.current_time, 1.0);
        assert_eq!(clock.wall_time(1.0), 1.0);
        assert_eq!(clock.wall_time(2.0), 3.0);
    }

    #[test]
    fn seek_is_clamped() {
        let mut clock = PlaybackClock::new(4.0, 0.0);
        clock.seek(9.0, 1.0);
        assert_eq!(clock.current_time, 4.0);
        assert_eq!(clock.remaining(), 0.0);
        clock.seek(-1.0, 1.0);
        assert_eq!(clock.current_time, 0.0);
    }
}
