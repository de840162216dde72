// Counts seconds between two runs of a player's buffer loop.
use bevy_ecs::prelude::Component;

#[derive(Component, Debug)]
pub struct BufferLoopTimer {
    pub period: f32,
    pub elapsed: f32,
}
impl BufferLoopTimer {
    pub fn new(period: f32) -> Self {
        BufferLoopTimer {
            period,
            elapsed: 0.0,
        }
    }
    pub fn reset(&mut self) {
        self.elapsed -= self.period;
    }
}
