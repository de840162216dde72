//! Adaptive streaming buffer engine for one volumetric player.
//!
//! The engine owns the quality ladders, the sparse frame buffers and the
//! playback clock of a single player. It performs no I/O: the buffer loop asks
//! it for [`FetchPlan`]s, the caller runs the requests wherever it likes and
//! feeds each completion back through [`StreamingEngine::on_fetch_completed`].
//! Once per rendered frame [`StreamingEngine::tick`] advances the state
//! machine, consumes buffer health and selects what to present.
//!
//! State machine:
//!
//! ```text
//! FetchingInitialBuffers -> Ready -> Playing <-> Buffering
//!                                      |
//!                                      v
//!                                    Ended
//! ```

use std::fmt;

use arrayvec::ArrayVec;
use log::{debug, info, trace, warn};

use super::buffer::{FrameBuffer, FrameKey};
use super::channel::{Adaptation, StreamChannelInfo, TargetFormat, TargetInfo};
use super::clock::PlaybackClock;
use super::loader::{Decoded, LoadError, LoadRequest, MeshFrame, MorphKeyframe, TextureFrame};
use super::manifest::{Manifest, MediaFormat, TextureType};
use super::paths::{PathParams, resolve_path};
use super::quality::{BufferTiers, DeviceProfile, estimate_bitrate, geometry_ladder, texture_ladder};

const EPSILON: f64 = 1e-6;

/// Settings shared by every engine of a client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub device: DeviceProfile,
    /// Seconds of already played frames kept behind the playhead.
    pub eviction_window: f64,
    pub min_buffer_to_play: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device: DeviceProfile::default(),
            eviction_window: 0.5,
            min_buffer_to_play: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Geometry,
    Texture(TextureType),
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Geometry => f.write_str("geometry"),
            ChannelId::Texture(texture_type) => write!(f, "texture:{}", texture_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Uninitialized,
    FetchingInitialBuffers,
    Ready,
    Playing,
    Buffering,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: StreamState,
    pub to: StreamState,
}

/// Buffered geometry payload.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryFrame {
    Mesh(MeshFrame),
    Keyframe(MorphKeyframe),
}

/// Requests of one batch for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPlan {
    pub channel: ChannelId,
    pub batch: u64,
    /// Slot `i` of the batch is `requests[i]`.
    pub requests: Vec<LoadRequest>,
}

/// Summary of a settled batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchReport {
    pub channel: ChannelId,
    pub batch: u64,
    pub loaded: usize,
    pub failed: usize,
    /// Buffer seconds actually added.
    pub gained: f64,
    pub metric: f64,
    pub adaptation: Adaptation,
}

/// Per-frame inputs owned by the player component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    pub paused: bool,
    pub auto_pause_when_buffering: bool,
    pub looping: bool,
    pub playback_rate: f64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            paused: true,
            auto_pause_when_buffering: true,
            looping: false,
            playback_rate: 1.0,
        }
    }
}

/// Latest sample of an attached audio track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioClock {
    pub current_time: f64,
    pub ended: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresentedGeometry {
    Mesh {
        key: FrameKey,
        frame: MeshFrame,
    },
    /// Bracketing keyframes and the blend factor towards `keyframe_b`.
    Morph {
        keyframe_a: Option<(FrameKey, MorphKeyframe)>,
        keyframe_b: Option<(FrameKey, MorphKeyframe)>,
        mix_ratio: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresentedTexture {
    pub texture_type: TextureType,
    pub key: FrameKey,
    pub frame: TextureFrame,
}

/// What the renderer should show for `time`.
///
/// Missing entries mean nothing is buffered for that channel; the renderer
/// keeps showing whatever it had.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Presentation {
    pub time: f64,
    pub geometry: Option<PresentedGeometry>,
    pub textures: ArrayVec<PresentedTexture, 5>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickOutcome {
    pub transition: Option<Transition>,
    pub presentation: Option<Presentation>,
    pub evicted: usize,
    /// Playback wrapped around to the start this tick.
    pub looped: bool,
}

#[derive(Debug)]
struct SlotResult<P> {
    entries: Vec<(u32, P)>,
    seconds: f64,
}

#[derive(Debug)]
enum Slot<P> {
    Pending,
    Loaded(SlotResult<P>),
    Failed,
}

#[derive(Debug)]
struct InFlight<P> {
    batch: u64,
    target: usize,
    /// Frame, or segment for uniform-solve, requested by slot 0.
    first_index: u32,
    started_at: f64,
    /// Seconds of the first segment that lie before the requested start frame.
    extra_time: f64,
    slots: Vec<Slot<P>>,
}

type Convert<P> = fn(&TargetInfo, u32, Decoded) -> Option<SlotResult<P>>;

#[derive(Debug)]
struct ChannelStream<P> {
    info: StreamChannelInfo,
    buffer: FrameBuffer<P>,
    in_flight: Option<InFlight<P>>,
    first_frame_loaded: bool,
    initial_buffer_loaded: bool,
}

impl<P> ChannelStream<P> {
    fn new(targets: Vec<TargetInfo>) -> Self {
        Self {
            info: StreamChannelInfo::new(targets),
            buffer: FrameBuffer::new(),
            in_flight: None,
            first_frame_loaded: false,
            initial_buffer_loaded: false,
        }
    }

    fn begin(&mut self, batch: u64, first_index: u32, extra_time: f64, slots: usize, now: f64) {
        self.info.pending_requests = slots;
        self.in_flight = Some(InFlight {
            batch,
            target: self.info.current_target,
            first_index,
            started_at: now,
            extra_time,
            slots: (0..slots).map(|_| Slot::Pending).collect(),
        });
    }

    /// Stores one completion. Returns the batch once every slot is done.
    fn record(
        &mut self,
        channel: ChannelId,
        batch: u64,
        slot: usize,
        result: Result<Decoded, LoadError>,
        convert: Convert<P>,
    ) -> Option<InFlight<P>> {
        let flight = self.in_flight.as_mut().filter(|f| f.batch == batch)?;
        let target = self.info.targets.get(flight.target)?;
        let index = flight.first_index + slot as u32;
        let entry = flight
            .slots
            .get_mut(slot)
            .filter(|s| matches!(s, Slot::Pending))?;
        *entry = match result {
            Ok(decoded) => match convert(target, index, decoded) {
                Some(loaded) => Slot::Loaded(loaded),
                None => {
                    warn!("{} batch {} slot {}: unexpected payload kind", channel, batch, slot);
                    Slot::Failed
                }
            },
            Err(e) => {
                debug!("{} batch {} slot {} failed: {}", channel, batch, slot, e);
                Slot::Failed
            }
        };
        self.info.pending_requests = self.info.pending_requests.saturating_sub(1);
        if flight.slots.iter().any(|s| matches!(s, Slot::Pending)) {
            return None;
        }
        self.in_flight.take()
    }

    /// Applies a completed batch in ascending slot order, then adapts.
    fn settle(
        &mut self,
        channel: ChannelId,
        flight: InFlight<P>,
        cap: f64,
        start_threshold: f64,
        now: f64,
    ) -> BatchReport {
        let mut loaded = 0;
        let mut failed = 0;
        let mut gained = 0.0;
        let mut overlap = 0.0;
        for (position, slot) in flight.slots.into_iter().enumerate() {
            match slot {
                Slot::Loaded(result) => {
                    loaded += 1;
                    if position == 0 && flight.extra_time >= 0.0 {
                        overlap = flight.extra_time;
                    }
                    for (frame, payload) in result.entries {
                        self.buffer.insert(FrameKey::new(flight.target, frame), payload);
                    }
                    gained += self.info.add_health(result.seconds, cap);
                    self.first_frame_loaded = true;
                }
                Slot::Failed | Slot::Pending => failed += 1,
            }
        }
        self.info.pending_requests = 0;

        // Throughput counts the whole segment; the part before the requested
        // start frame was already buffered and only comes off the lookahead.
        let fetch_time = (now - flight.started_at).max(0.0);
        let metric = if gained > EPSILON {
            fetch_time / gained
        } else {
            f64::INFINITY
        };
        let adaptation = self.info.adapt(metric);
        self.info.consume(overlap);

        if !self.initial_buffer_loaded
            && self.first_frame_loaded
            && self.info.buffer_health + EPSILON >= start_threshold
        {
            self.initial_buffer_loaded = true;
        }
        BatchReport {
            channel,
            batch: flight.batch,
            loaded,
            failed,
            gained,
            metric,
            adaptation,
        }
    }

    /// Abandons `batch` if it is the one in flight.
    fn cancel(&mut self, batch: u64) -> bool {
        if self.in_flight.as_ref().is_some_and(|f| f.batch == batch) {
            self.in_flight = None;
            self.info.pending_requests = 0;
            true
        } else {
            false
        }
    }

    /// Drops buffered frames and any batch in flight. Returns frames released.
    fn discard(&mut self) -> usize {
        self.in_flight = None;
        self.info.reset();
        self.buffer.clear()
    }

    fn reset(&mut self) -> usize {
        self.first_frame_loaded = false;
        self.initial_buffer_loaded = false;
        self.discard()
    }

    fn evict(&mut self, cutoff: f64) -> usize {
        let mut evicted = 0;
        for (index, target) in self.info.targets.iter().enumerate() {
            evicted += self.buffer.evict_before(index, target.frame_rate, cutoff);
        }
        evicted
    }

    /// Frame of target `index` to show at `time`, using `pick` to round.
    fn frame_at(&self, index: usize, time: f64, pick: fn(f64) -> f64) -> Option<u32> {
        let target = self.info.targets.get(index)?;
        let frame = pick(time * target.frame_rate).max(0.0) as u32;
        Some(frame.min(target.last_frame()))
    }

    fn find_nearest(&self, time: f64, pick: fn(f64) -> f64) -> Option<(FrameKey, &P)> {
        self.buffer
            .find(self.info.current_target, self.info.targets.len(), |index| {
                self.frame_at(index, time, pick)
            })
    }
}

fn floor_frame(x: f64) -> f64 {
    (x + EPSILON).floor()
}

fn ceil_frame(x: f64) -> f64 {
    (x - EPSILON).ceil()
}

fn convert_geometry(target: &TargetInfo, index: u32, decoded: Decoded) -> Option<SlotResult<GeometryFrame>> {
    match (target.segment, decoded) {
        (Some(segment), Decoded::Segment(keyframes)) => {
            let offset = index * segment.frame_count;
            let entries: Vec<_> = keyframes
                .into_iter()
                .enumerate()
                .map(|(i, keyframe)| (offset + i as u32, GeometryFrame::Keyframe(keyframe)))
                .collect();
            let seconds = entries.len() as f64 / target.frame_rate;
            Some(SlotResult { entries, seconds })
        }
        (None, Decoded::Mesh(mesh)) => Some(SlotResult {
            entries: vec![(index, GeometryFrame::Mesh(mesh))],
            seconds: 1.0 / target.frame_rate,
        }),
        _ => None,
    }
}

fn convert_texture(target: &TargetInfo, index: u32, decoded: Decoded) -> Option<SlotResult<TextureFrame>> {
    match decoded {
        Decoded::Texture(frame) => Some(SlotResult {
            entries: vec![(index, frame)],
            seconds: 1.0 / target.frame_rate,
        }),
        _ => None,
    }
}

/// Frames `[start, end]` to request so the lookahead tops up to the maximum.
///
/// `None` when the channel is already healthy, has a batch in flight or is
/// buffered through its last frame.
fn plan_range(info: &StreamChannelInfo, current_time: f64, tiers: &BufferTiers) -> Option<(u32, u32)> {
    if info.pending_requests > 0 {
        return None;
    }
    let lookahead = info.buffer_health;
    if lookahead >= tiers.buffer_threshold.min(tiers.max_buffer_health) {
        return None;
    }
    let target = info.current();
    let start = ((current_time + lookahead) * target.frame_rate).round().max(0.0) as u32;
    if start >= target.frame_count {
        return None;
    }
    let frames = ((tiers.max_buffer_health - lookahead) * target.frame_rate + EPSILON)
        .floor()
        .max(1.0) as u32;
    let end = start.saturating_add(frames - 1).min(target.last_frame());
    Some((start, end))
}

/// Streaming state of one volumetric player.
#[derive(Debug)]
pub struct StreamingEngine {
    manifest: Manifest,
    manifest_path: String,
    uniform_solve: bool,
    tiers: BufferTiers,
    eviction_window: f64,
    state: StreamState,
    clock: PlaybackClock,
    geometry: ChannelStream<GeometryFrame>,
    textures: ArrayVec<(TextureType, ChannelStream<TextureFrame>), 5>,
    next_batch: u64,
}

impl StreamingEngine {
    /// Builds the quality ladders and buffer tiers and starts fetching.
    pub fn new(manifest: Manifest, manifest_path: impl Into<String>, config: &EngineConfig, now: f64) -> Self {
        let manifest_path = manifest_path.into();
        let geometry_targets = geometry_ladder(&manifest);
        let mut textures = ArrayVec::new();
        for (texture_type, channel) in &manifest.texture {
            textures.push((
                *texture_type,
                ChannelStream::new(texture_ladder(channel, config.device)),
            ));
        }

        let texture_ladders: Vec<&[TargetInfo]> = textures
            .iter()
            .map(|(_, stream): &(TextureType, ChannelStream<TextureFrame>)| stream.info.targets.as_slice())
            .collect();
        let bitrate = estimate_bitrate(manifest.duration, &geometry_targets, &texture_ladders);
        let tiers = BufferTiers::select(bitrate, config.device, config.min_buffer_to_play);
        info!(
            "Mounted '{}': {:.2}s, {} geometry targets, {} texture channels, bitrate {:?} B/s, buffer {}s",
            manifest_path,
            manifest.duration,
            geometry_targets.len(),
            textures.len(),
            bitrate.map(|b| b.round()),
            tiers.max_buffer_health
        );

        Self {
            uniform_solve: manifest.is_uniform_solve(),
            clock: PlaybackClock::new(manifest.duration, now),
            manifest,
            manifest_path,
            tiers,
            eviction_window: config.eviction_window,
            state: StreamState::FetchingInitialBuffers,
            geometry: ChannelStream::new(geometry_targets),
            textures,
            next_batch: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn tiers(&self) -> &BufferTiers {
        &self.tiers
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn is_uniform_solve(&self) -> bool {
        self.uniform_solve
    }

    pub fn channel(&self, channel: ChannelId) -> Option<&StreamChannelInfo> {
        match channel {
            ChannelId::Geometry => Some(&self.geometry.info),
            ChannelId::Texture(texture_type) => self.texture(texture_type).map(|s| &s.info),
        }
    }

    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        std::iter::once(ChannelId::Geometry)
            .chain(self.textures.iter().map(|(t, _)| ChannelId::Texture(*t)))
    }

    /// Number of frames buffered for a channel, across all targets.
    pub fn buffered_frames(&self, channel: ChannelId) -> usize {
        match channel {
            ChannelId::Geometry => self.geometry.buffer.len(),
            ChannelId::Texture(texture_type) => self.texture(texture_type).map_or(0, |s| s.buffer.len()),
        }
    }

    pub fn is_buffered(&self, channel: ChannelId, key: FrameKey) -> bool {
        match channel {
            ChannelId::Geometry => self.geometry.buffer.contains(&key),
            ChannelId::Texture(texture_type) => self.texture(texture_type).is_some_and(|s| s.buffer.contains(&key)),
        }
    }

    pub fn first_frames_loaded(&self) -> bool {
        self.geometry.first_frame_loaded && self.textures.iter().all(|(_, s)| s.first_frame_loaded)
    }

    pub fn initial_geometry_buffers_loaded(&self) -> bool {
        self.geometry.initial_buffer_loaded
    }

    pub fn initial_texture_buffers_loaded(&self) -> bool {
        self.textures.iter().all(|(_, s)| s.initial_buffer_loaded)
    }

    pub fn initial_buffers_loaded(&self) -> bool {
        self.first_frames_loaded() && self.initial_geometry_buffers_loaded() && self.initial_texture_buffers_loaded()
    }

    /// Resolved URL of the audio track, using its first declared format.
    pub fn audio_url(&self) -> Option<String> {
        let audio = self.manifest.audio.as_ref()?;
        let format = *audio.formats.first()?;
        Some(resolve_path(
            &audio.path,
            &self.manifest_path,
            MediaFormat::Audio(format),
            PathParams::default(),
        ))
    }

    pub fn audio_playback_rate(&self) -> f64 {
        self.manifest.audio.as_ref().map_or(1.0, |a| a.playback_rate)
    }

    fn texture(&self, texture_type: TextureType) -> Option<&ChannelStream<TextureFrame>> {
        self.textures.iter().find(|(t, _)| *t == texture_type).map(|(_, s)| s)
    }

    fn set_state(&mut self, to: StreamState) -> Option<Transition> {
        if self.state == to {
            return None;
        }
        let from = self.state;
        self.state = to;
        info!(
            "'{}' {:?} -> {:?} at {:.3}s",
            self.manifest_path, from, to, self.clock.current_time
        );
        Some(Transition { from, to })
    }

    fn next_batch(&mut self) -> u64 {
        self.next_batch += 1;
        self.next_batch
    }

    fn health_cap(&self) -> f64 {
        self.tiers.max_buffer_health.min(self.clock.remaining())
    }

    fn start_threshold(&self) -> f64 {
        self.tiers.min_buffer_to_start.min(self.clock.remaining())
    }

    /// Fetch batches due now, at most one per channel.
    pub fn plan_fetches(&mut self, now: f64) -> Vec<FetchPlan> {
        if matches!(self.state, StreamState::Uninitialized | StreamState::Ended) {
            return Vec::new();
        }
        let mut plans = Vec::new();
        if let Some(plan) = self.plan_geometry(now) {
            plans.push(plan);
        }
        for index in 0..self.textures.len() {
            if let Some(plan) = self.plan_texture(index, now) {
                plans.push(plan);
            }
        }
        plans
    }

    fn plan_geometry(&mut self, now: f64) -> Option<FetchPlan> {
        let (start, end) = plan_range(&self.geometry.info, self.clock.current_time, &self.tiers)?;
        let target = self.geometry.info.current().clone();
        let TargetFormat::Geometry(format) = target.format else {
            return None;
        };
        let url = |index: u32| {
            resolve_path(
                &self.manifest.geometry.path,
                &self.manifest_path,
                MediaFormat::Geometry(format),
                PathParams {
                    target: Some(&target.name),
                    index: Some(index),
                    texture_type: None,
                },
            )
        };

        let (requests, first_index, extra_time) = match target.segment {
            Some(segment) => {
                let first_segment = start / segment.frame_count;
                let last_segment = end / segment.frame_count;
                let extra_time = target.frame_time(start) - first_segment as f64 * segment.duration;
                let requests: Vec<_> = (first_segment..=last_segment)
                    .map(|s| LoadRequest::Geometry {
                        url: url(s),
                        format,
                        keyframes: segment
                            .frame_count
                            .min(target.frame_count.saturating_sub(s * segment.frame_count)),
                    })
                    .collect();
                (requests, first_segment, extra_time)
            }
            None => {
                let requests: Vec<_> = (start..=end)
                    .map(|f| LoadRequest::Geometry {
                        url: url(f),
                        format,
                        keyframes: 1,
                    })
                    .collect();
                (requests, start, 0.0)
            }
        };

        let batch = self.next_batch();
        debug!(
            "geometry batch {}: target '{}' frames {}..={} ({} requests, extra {:.3}s)",
            batch,
            target.name,
            start,
            end,
            requests.len(),
            extra_time
        );
        self.geometry.begin(batch, first_index, extra_time, requests.len(), now);
        Some(FetchPlan {
            channel: ChannelId::Geometry,
            batch,
            requests,
        })
    }

    fn plan_texture(&mut self, index: usize, now: f64) -> Option<FetchPlan> {
        let (texture_type, stream) = &self.textures[index];
        let texture_type = *texture_type;
        let (start, end) = plan_range(&stream.info, self.clock.current_time, &self.tiers)?;
        let target = stream.info.current().clone();
        let TargetFormat::Texture(format) = target.format else {
            return None;
        };
        let template = &self.manifest.texture.get(&texture_type)?.path;
        let requests: Vec<_> = (start..=end)
            .map(|frame| LoadRequest::Texture {
                url: resolve_path(
                    template,
                    &self.manifest_path,
                    MediaFormat::Texture(format),
                    PathParams {
                        target: Some(&target.name),
                        index: Some(frame),
                        texture_type: Some(texture_type),
                    },
                ),
                format,
            })
            .collect();

        let batch = self.next_batch();
        debug!(
            "{} batch {}: target '{}' frames {}..={}",
            texture_type, batch, target.name, start, end
        );
        self.textures[index]
            .1
            .begin(batch, start, 0.0, requests.len(), now);
        Some(FetchPlan {
            channel: ChannelId::Texture(texture_type),
            batch,
            requests,
        })
    }

    /// Applies one finished request. Returns a report once its batch settles.
    ///
    /// Completions for batches that are no longer in flight are ignored.
    pub fn on_fetch_completed(
        &mut self,
        channel: ChannelId,
        batch: u64,
        slot: usize,
        result: Result<Decoded, LoadError>,
        now: f64,
    ) -> Option<BatchReport> {
        let cap = self.health_cap();
        let start_threshold = self.start_threshold();
        let report = match channel {
            ChannelId::Geometry => {
                let flight = self.geometry.record(channel, batch, slot, result, convert_geometry)?;
                self.geometry.settle(channel, flight, cap, start_threshold, now)
            }
            ChannelId::Texture(texture_type) => {
                let (_, stream) = self.textures.iter_mut().find(|(t, _)| *t == texture_type)?;
                let flight = stream.record(channel, batch, slot, result, convert_texture)?;
                stream.settle(channel, flight, cap, start_threshold, now)
            }
        };
        debug!(
            "{} batch {} settled: {} loaded, {} failed, +{:.3}s, metric {:.3}, {:?}",
            report.channel, report.batch, report.loaded, report.failed, report.gained, report.metric, report.adaptation
        );
        Some(report)
    }

    /// Abandons a planned batch that could not be dispatched, reopening the
    /// channel for the next buffer loop. Late completions of it are ignored.
    pub fn cancel_batch(&mut self, channel: ChannelId, batch: u64) -> bool {
        let stream_cancelled = match channel {
            ChannelId::Geometry => self.geometry.cancel(batch),
            ChannelId::Texture(texture_type) => self
                .textures
                .iter_mut()
                .find(|(t, _)| *t == texture_type)
                .is_some_and(|(_, stream)| stream.cancel(batch)),
        };
        if stream_cancelled {
            debug!("{} batch {} abandoned", channel, batch);
        }
        stream_cancelled
    }

    /// Pins (or with `None` releases) the quality target of a channel.
    pub fn set_user_target(&mut self, channel: ChannelId, target: Option<usize>) -> bool {
        let info = match channel {
            ChannelId::Geometry => &mut self.geometry.info,
            ChannelId::Texture(texture_type) => match self.textures.iter_mut().find(|(t, _)| *t == texture_type) {
                Some((_, stream)) => &mut stream.info,
                None => return false,
            },
        };
        info.set_user_target(target);
        true
    }

    fn lookaheads(&self) -> impl Iterator<Item = f64> + '_ {
        std::iter::once(self.geometry.info.buffer_health)
            .chain(self.textures.iter().map(|(_, s)| s.info.buffer_health))
    }

    /// True when any channel holds less than the playable minimum.
    pub fn is_starved(&self) -> bool {
        let threshold = self.tiers.min_buffer_to_play.min(self.clock.remaining());
        self.lookaheads().any(|health| health + EPSILON < threshold)
    }

    fn discard_buffers(&mut self) -> usize {
        let mut released = self.geometry.discard();
        for (_, stream) in self.textures.iter_mut() {
            released += stream.discard();
        }
        released
    }

    /// Jumps to `time`, dropping every buffered frame and batch in flight.
    pub fn seek(&mut self, time: f64, now: f64) -> Option<Transition> {
        let mut released = self.geometry.reset();
        for (_, stream) in self.textures.iter_mut() {
            released += stream.reset();
        }
        self.clock.seek(time, now);
        debug!(
            "'{}' seek to {:.3}s released {} frames",
            self.manifest_path, self.clock.current_time, released
        );
        if self.state == StreamState::Uninitialized {
            return None;
        }
        self.set_state(StreamState::FetchingInitialBuffers)
    }

    fn restart(&mut self, now: f64) {
        let released = self.discard_buffers();
        self.clock.seek(0.0, now);
        info!("'{}' looped, released {} frames", self.manifest_path, released);
    }

    fn consume(&mut self, seconds: f64) {
        self.geometry.info.consume(seconds);
        for (_, stream) in self.textures.iter_mut() {
            stream.info.consume(seconds);
        }
    }

    fn evict(&mut self) -> usize {
        let cutoff = self.clock.current_time - self.eviction_window;
        let mut evicted = self.geometry.evict(cutoff);
        for (_, stream) in self.textures.iter_mut() {
            evicted += stream.evict(cutoff);
        }
        if evicted > 0 {
            trace!("'{}' evicted {} frames before {:.3}s", self.manifest_path, evicted, cutoff);
        }
        evicted
    }

    /// Advances the state machine and playhead by one rendered frame.
    pub fn tick(&mut self, now: f64, settings: &PlaybackSettings, audio: Option<AudioClock>) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        match self.state {
            StreamState::Uninitialized | StreamState::Ended => return outcome,
            StreamState::FetchingInitialBuffers => {
                if self.clock.remaining() <= EPSILON {
                    outcome.transition = self.set_state(StreamState::Ended);
                    return outcome;
                }
                if self.initial_buffers_loaded() {
                    outcome.transition = self.set_state(StreamState::Ready);
                }
                if self.first_frames_loaded() {
                    outcome.presentation = Some(self.present());
                }
                return outcome;
            }
            StreamState::Ready => {
                if !settings.paused {
                    self.clock.playback_rate = settings.playback_rate;
                    self.clock.anchor(now);
                    outcome.transition = self.set_state(StreamState::Playing);
                }
                outcome.presentation = Some(self.present());
                return outcome;
            }
            StreamState::Playing | StreamState::Buffering => {}
        }

        if settings.paused {
            outcome.transition = self.set_state(StreamState::Ready);
            return outcome;
        }

        let starved = settings.auto_pause_when_buffering && self.is_starved();
        match (self.state, starved) {
            (StreamState::Playing, true) => {
                outcome.transition = self.set_state(StreamState::Buffering);
                return outcome;
            }
            // Frozen: the clock does not advance while waiting.
            (StreamState::Buffering, true) => return outcome,
            (StreamState::Buffering, false) => {
                self.clock.anchor(now);
                outcome.transition = self.set_state(StreamState::Playing);
            }
            _ => {}
        }

        // Time since the last tick was played at the old rate.
        let time = match audio {
            Some(sample) => sample.current_time,
            None => self.clock.wall_time(now),
        };
        let elapsed = time - self.clock.current_time;
        if elapsed > 0.0 {
            self.consume(elapsed);
        }
        self.clock.current_time = time;
        self.clock.set_rate(settings.playback_rate, now);

        let audio_ended = audio.is_some_and(|sample| sample.ended);
        if self.clock.current_time > self.clock.duration || audio_ended {
            if settings.looping {
                self.restart(now);
                outcome.looped = true;
            } else {
                self.clock.current_time = self.clock.duration;
                outcome.transition = self.set_state(StreamState::Ended);
                return outcome;
            }
        }

        outcome.presentation = Some(self.present());
        outcome.evicted = self.evict();
        outcome
    }

    /// Selects the geometry and textures for the current playhead.
    pub fn present(&self) -> Presentation {
        let time = self.clock.current_time;
        let geometry = if self.uniform_solve {
            self.present_morph(time)
        } else {
            self.geometry
                .find_nearest(time, f64::round)
                .and_then(|(key, payload)| match payload {
                    GeometryFrame::Mesh(frame) => Some(PresentedGeometry::Mesh {
                        key,
                        frame: frame.clone(),
                    }),
                    GeometryFrame::Keyframe(_) => None,
                })
        };

        let mut textures = ArrayVec::new();
        for (texture_type, stream) in &self.textures {
            if let Some((key, frame)) = stream.find_nearest(time, f64::round) {
                textures.push(PresentedTexture {
                    texture_type: *texture_type,
                    key,
                    frame: frame.clone(),
                });
            }
        }

        Presentation {
            time,
            geometry,
            textures,
        }
    }

    fn present_morph(&self, time: f64) -> Option<PresentedGeometry> {
        let keyframe = |pick: fn(f64) -> f64| {
            self.geometry
                .find_nearest(time, pick)
                .and_then(|(key, payload)| match payload {
                    GeometryFrame::Keyframe(k) => Some((key, k.clone())),
                    GeometryFrame::Mesh(_) => None,
                })
        };
        let keyframe_a = keyframe(floor_frame);
        let keyframe_b = keyframe(ceil_frame);

        let key_time = |key: &FrameKey| {
            self.geometry
                .info
                .targets
                .get(key.target)
                .map_or(time, |t| t.frame_time(key.frame))
        };
        let mix_ratio = match (&keyframe_a, &keyframe_b) {
            (None, None) => return None,
            (Some(_), None) => 0.0,
            (None, Some(_)) => 1.0,
            (Some((a, _)), Some((b, _))) => {
                let before = (time - key_time(a)).max(0.0);
                let after = (key_time(b) - time).max(0.0);
                if before + after <= EPSILON {
                    0.5
                } else {
                    (before / (before + after)) as f32
                }
            }
        };
        Some(PresentedGeometry::Morph {
            keyframe_a,
            keyframe_b,
            mix_ratio,
        })
    }
}
