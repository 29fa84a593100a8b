//! Turns a stream of tick-stamped authoritative poses into smooth per-frame motion.
//!
//! The flow is (for a tick T):
//! - `pre_tick`: record the rendered pose before the simulation runs, evict excess snapshots
//! - the simulation moves the anchor (the tick-driven object) to its pose for tick T
//! - `post_tick(T, pose)`: put the rendered object back where it was before the tick (it might have
//!   been dragged along by the anchor) and buffer the snapshot for tick T
//! - `update(delta)`, once per frame: move the rendered object towards the oldest buffered
//!   snapshot.
//!   Once it is reached, it is dequeued and we start moving towards the next one.
//!
//! During a rollback, `post_replay(T, pose)` can overwrite the snapshot for tick T as long as it
//! hasn't been consumed yet.
use crate::buffer::{SnapshotBuffer, TickSnapshot};
use crate::config::{SmoothedProperties, SmootherConfig};
use crate::host::TransformHost;
use crate::interpolation::AdaptiveInterpolation;
use crate::rate::{compute_rate, MoveRate, RateDecision};
use bevy_reflect::Reflect;
use tick_smoother_core::clock::NetworkClock;
use tick_smoother_core::pose::{Pose, POSE_TOLERANCE};
use tick_smoother_core::tick::Tick;
use tracing::{debug, trace, warn};

/// By how much the movement multiplier changes per adjustment
pub const MULTIPLIER_STEP: f32 = 0.015;
pub const MIN_MOVEMENT_MULTIPLIER: f32 = 0.95;
pub const MAX_MOVEMENT_MULTIPLIER: f32 = 1.05;
/// Multiplier we settle towards when the buffer sits exactly at its target depth
const SETTLED_MOVEMENT_MULTIPLIER: f32 = 0.99;
/// Playback stalls while the buffer is more than this many ticks below its target depth
pub const STARVATION_TICKS: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum SmootherStatus {
    /// `initialize` has not been called yet
    Uninitialized,
    /// Attached, nothing buffered
    Idle,
    /// Attached, waiting for the buffer to refill before moving
    Buffering,
    /// Attached, moving towards the buffered snapshots
    Playing,
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Attached,
    Detached,
}

/// Smoothing state of one entity.
///
/// Every callback takes the host explicitly; the smoother holds no reference to the scene graph.
#[derive(Debug, Clone)]
pub struct Smoother {
    config: SmootherConfig,
    lifecycle: Lifecycle,
    is_owner: bool,
    clock: NetworkClock,
    /// Last authoritative tick the client had state for, as reported by reconciliation
    client_state_tick: Tick,
    buffer: SnapshotBuffer,
    /// `None` means there is no segment in progress: the rendered object stays where it is
    move_rate: Option<MoveRate>,
    movement_multiplier: f32,
    /// Pose of the rendered object in the local space of the anchor, recorded on initialization
    offset: Pose,
    /// True if we detached the rendered object from the anchor and need to re-attach it later
    detached_graphical: bool,
    /// True once a `pre_tick` has been observed since `initialize`
    pre_ticked: bool,
    pre_tick_pose: Option<Pose>,
    last_tick: Tick,
    /// Snapshots at or before this tick are ignored
    teleported_tick: Option<Tick>,
}

impl Default for Smoother {
    fn default() -> Self {
        Self::new(SmootherConfig::default())
    }
}

impl Smoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self {
            config,
            lifecycle: Lifecycle::Uninitialized,
            is_owner: false,
            clock: NetworkClock::default(),
            client_state_tick: Tick::UNSET,
            buffer: SnapshotBuffer::new(),
            move_rate: None,
            movement_multiplier: 1.0,
            offset: Pose::IDENTITY,
            detached_graphical: false,
            pre_ticked: false,
            pre_tick_pose: None,
            last_tick: Tick::UNSET,
            teleported_tick: None,
        }
    }

    pub fn with_owner(mut self, is_owner: bool) -> Self {
        self.is_owner = is_owner;
        self
    }

    pub fn config(&self) -> &SmootherConfig {
        &self.config
    }

    pub fn status(&self) -> SmootherStatus {
        match self.lifecycle {
            Lifecycle::Uninitialized => SmootherStatus::Uninitialized,
            Lifecycle::Detached => SmootherStatus::Detached,
            Lifecycle::Attached if self.buffer.is_empty() => SmootherStatus::Idle,
            Lifecycle::Attached if self.is_starved() => SmootherStatus::Buffering,
            Lifecycle::Attached => SmootherStatus::Playing,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.lifecycle == Lifecycle::Attached
    }

    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    pub fn buffer(&self) -> &SnapshotBuffer {
        &self.buffer
    }

    pub fn move_rate(&self) -> Option<&MoveRate> {
        self.move_rate.as_ref()
    }

    pub fn movement_multiplier(&self) -> f32 {
        self.movement_multiplier
    }

    /// Number of ticks the smoother currently tries to keep buffered
    pub fn current_ticks(&self) -> u8 {
        self.config.interpolation.current_ticks()
    }

    pub fn offset(&self) -> &Pose {
        &self.offset
    }

    pub fn teleported_tick(&self) -> Option<Tick> {
        self.teleported_tick
    }

    fn smoothed_properties(&self) -> SmoothedProperties {
        if self.is_owner {
            self.config.owner_properties
        } else {
            self.config.spectator_properties
        }
    }

    fn is_starved(&self) -> bool {
        self.current_ticks() as i32 - self.buffer.len() as i32 > STARVATION_TICKS
    }

    /// Start smoothing.
    ///
    /// Records the pose of the rendered object relative to the anchor: every snapshot is rendered
    /// with that same offset.
    pub fn initialize(&mut self, host: &mut impl TransformHost, clock: &NetworkClock) {
        let anchor = host.anchor_pose();
        let graphical = host.graphical_pose();
        self.offset = if anchor.is_valid() && graphical.is_valid() {
            graphical.relative_to(&anchor)
        } else {
            warn!("initializing smoother with an invalid pose, using no offset");
            Pose::IDENTITY
        };
        self.detached_graphical = self.config.detach && host.detach_graphical();
        self.clock = *clock;
        self.client_state_tick = Tick::UNSET;
        self.clear_queue();
        self.movement_multiplier = 1.0;
        self.pre_ticked = false;
        self.pre_tick_pose = None;
        self.last_tick = clock.local_tick;
        self.teleported_tick = None;
        self.lifecycle = Lifecycle::Attached;
        self.recompute_interpolation();
        debug!(
            offset = ?self.offset,
            detached = self.detached_graphical,
            current_ticks = self.current_ticks(),
            "initialized tick smoother"
        );
    }

    /// Update the tick duration and network statistics used by the smoother
    pub fn set_clock(&mut self, clock: &NetworkClock) {
        self.clock = *clock;
    }

    pub fn pre_tick(&mut self, host: &mut impl TransformHost) {
        if !self.is_attached() {
            return;
        }
        self.pre_ticked = true;
        self.discard_excess(host);
        // recorded after the eviction, which can snap the rendered object
        self.pre_tick_pose = Some(host.graphical_pose());
    }

    pub fn post_tick(&mut self, host: &mut impl TransformHost, tick: Tick, authoritative: &Pose) {
        if !self.is_attached() {
            return;
        }
        // the rendered object could have been dragged along by the anchor during the tick
        if let Some(pose) = self.pre_tick_pose.take() {
            host.set_graphical_pose(&pose);
        }
        if !authoritative.is_valid() {
            warn!(?tick, "ignoring invalid authoritative pose");
            return;
        }
        let target = authoritative.compose(&self.offset);
        if !self.pre_ticked {
            trace!(?tick, "no pre-tick observed since initialization, snapping");
            self.clear_queue();
            host.set_graphical_pose(&target);
            self.last_tick = tick;
            return;
        }
        if self.teleported_tick.is_some_and(|teleported| tick <= teleported) {
            trace!(?tick, "ignoring snapshot from before the last teleport");
            return;
        }
        match self.buffer.enqueue(TickSnapshot::new(tick, target)) {
            Ok(first) => {
                self.last_tick = tick;
                if first {
                    self.start_segment_from_rendered(host);
                }
            }
            Err(error) => warn!(?tick, ?error, "dropping snapshot"),
        }
    }

    /// Called before a reconciliation, with the authoritative tick the client last had state for
    pub fn pre_reconcile(&mut self, clock: &NetworkClock, client_state_tick: Tick) {
        if !self.is_attached() {
            return;
        }
        self.clock = *clock;
        self.client_state_tick = client_state_tick;
        self.recompute_interpolation();
    }

    /// Called for each re-simulated tick with the corrected authoritative pose.
    ///
    /// Only snapshots that are still buffered can be corrected; later corrections are dropped.
    pub fn post_replay(&mut self, host: &impl TransformHost, tick: Tick, corrected: &Pose) {
        if !self.is_attached() || !self.config.interpolation.uses_adaptive(self.is_owner) {
            return;
        }
        if self.teleported_tick.is_some_and(|teleported| tick <= teleported) {
            trace!(?tick, "ignoring correction from before the last teleport");
            return;
        }
        if !corrected.is_valid() {
            warn!(?tick, "ignoring invalid corrected pose");
            return;
        }
        let target = corrected.compose(&self.offset);
        if !self.buffer.replace_at(tick, target) {
            return;
        }
        debug!(?tick, "corrected buffered snapshot");
        // the segment in progress was computed towards the old pose
        if self.buffer.head().is_some_and(|head| head.tick == tick)
            && let Some(rate) = self.move_rate
            && !rate.is_complete()
        {
            let source = host.graphical_pose();
            self.move_rate = match compute_rate(&source, &target, rate.time_remaining, 1, None) {
                Ok(RateDecision::Interpolate(mut new_rate)) => {
                    new_rate.tick_span = rate.tick_span;
                    Some(new_rate)
                }
                _ => Some(rate),
            };
        }
    }

    /// Advance the rendered object. Called once per frame with the frame duration in seconds.
    pub fn update(&mut self, host: &mut impl TransformHost, delta: f32) {
        if !self.is_attached() {
            return;
        }
        if !delta.is_finite() || delta < 0.0 {
            warn!(?delta, "ignoring invalid frame delta");
            return;
        }
        if self.buffer.is_empty() {
            return;
        }
        let depth_above_target = self.buffer.len() as i32 - self.current_ticks() as i32;
        if -depth_above_target > STARVATION_TICKS {
            trace!(
                depth = self.buffer.len(),
                current_ticks = self.current_ticks(),
                "buffer starved, waiting for it to refill"
            );
            return;
        }
        self.adjust_movement_multiplier(depth_above_target);
        self.advance(host, delta * self.movement_multiplier);
    }

    /// Snap the rendered object to the anchor and drop everything buffered
    pub fn teleport(&mut self, host: &mut impl TransformHost) {
        if !self.is_attached() {
            return;
        }
        let anchor = host.anchor_pose();
        self.clear_queue();
        if anchor.is_valid() {
            host.set_graphical_pose(&anchor.compose(&self.offset));
        }
        self.teleported_tick = Some(self.last_tick);
        debug!(tick = ?self.last_tick, "teleported");
    }

    /// Stop smoothing. Calling this more than once has no effect.
    pub fn detach(&mut self, host: &mut impl TransformHost) {
        if self.lifecycle != Lifecycle::Attached {
            return;
        }
        if self.detached_graphical {
            host.reattach_graphical(&self.offset);
            self.detached_graphical = false;
        }
        self.clear_queue();
        self.pre_tick_pose = None;
        self.lifecycle = Lifecycle::Detached;
        debug!("detached tick smoother");
    }

    pub fn set_smoothed_properties(&mut self, properties: SmoothedProperties, for_spectator: bool) {
        self.config = self.config.with_smoothed_properties(properties, for_spectator);
    }

    pub fn set_adaptive_interpolation(&mut self, adaptive: AdaptiveInterpolation) {
        self.config.interpolation.adaptive = adaptive;
        self.recompute_interpolation();
    }

    /// Set the number of ticks buffered for spectated entities.
    ///
    /// The value overrides `current_ticks` right away, even when adaptive interpolation stays
    /// enabled: in that case it only holds until the next reconciliation recomputes it.
    pub fn set_interpolation_ticks(&mut self, ticks: u8, disable_adaptive: bool) {
        let ticks = ticks.max(1);
        self.config.interpolation.spectator_ticks = ticks;
        if disable_adaptive {
            self.config.interpolation.adaptive = AdaptiveInterpolation::Off;
        }
        if !self.is_owner {
            self.config.interpolation.set_current_ticks(ticks);
        }
    }

    pub fn set_teleport_threshold(&mut self, threshold: Option<f32>) {
        self.config.teleport_threshold = threshold;
    }

    /// Update whether the local peer controls the entity
    pub fn set_owner(&mut self, is_owner: bool) {
        if self.is_owner == is_owner {
            return;
        }
        self.is_owner = is_owner;
        self.recompute_interpolation();
    }

    fn recompute_interpolation(&mut self) {
        self.config
            .interpolation
            .recompute(self.is_owner, &self.clock, self.client_state_tick);
    }

    fn clear_queue(&mut self) {
        self.buffer.clear();
        self.move_rate = None;
    }

    fn discard_excess(&mut self, host: &mut impl TransformHost) {
        let Some(discarded) = self.buffer.discard_excess(self.current_ticks() as usize) else {
            return;
        };
        self.move_rate = None;
        if self.start_segment(discarded.pose, Some(discarded.tick)) == SegmentStart::Teleport {
            self.teleport_to_head(host);
        }
    }

    fn adjust_movement_multiplier(&mut self, depth_above_target: i32) {
        let multiplier = if depth_above_target > 0 {
            self.movement_multiplier + MULTIPLIER_STEP * depth_above_target as f32
        } else if depth_above_target == 0 {
            let gap = SETTLED_MOVEMENT_MULTIPLIER - self.movement_multiplier;
            self.movement_multiplier + gap.clamp(-MULTIPLIER_STEP, MULTIPLIER_STEP)
        } else {
            self.movement_multiplier - MULTIPLIER_STEP
        };
        self.movement_multiplier =
            multiplier.clamp(MIN_MOVEMENT_MULTIPLIER, MAX_MOVEMENT_MULTIPLIER);
    }

    /// Start a segment from the rendered pose towards the buffer head
    fn start_segment_from_rendered(&mut self, host: &mut impl TransformHost) {
        let Some(head) = self.buffer.head() else {
            return;
        };
        let source = host.graphical_pose();
        if source.approx_eq(&head.pose, POSE_TOLERANCE) {
            // already there, nothing to show
            self.move_rate = Some(MoveRate::completed());
            return;
        }
        if self.start_segment(source, None) == SegmentStart::Teleport {
            self.teleport_to_head(host);
        }
    }

    /// Compute the rate from `source` (at `source_tick` if it comes from a snapshot) to the
    /// buffer head
    fn start_segment(&mut self, source: Pose, source_tick: Option<Tick>) -> SegmentStart {
        let Some(head) = self.buffer.head().copied() else {
            self.move_rate = None;
            return SegmentStart::Empty;
        };
        let tick_delta = source_tick.map_or(1, |tick| head.tick - tick);
        let duration = self.clock.tick_secs() * tick_delta.max(1) as f32;
        match compute_rate(
            &source,
            &head.pose,
            duration,
            tick_delta,
            self.config.teleport_threshold,
        ) {
            Ok(RateDecision::Interpolate(rate)) => {
                self.move_rate = Some(rate);
                SegmentStart::Started
            }
            Ok(RateDecision::Teleport) => SegmentStart::Teleport,
            Err(error) => {
                // reach the head on the next update
                warn!(
                    ?error,
                    tick = ?head.tick,
                    "could not compute move rate, snapping to snapshot"
                );
                self.move_rate = Some(MoveRate::completed());
                SegmentStart::Started
            }
        }
    }

    fn teleport_to_head(&mut self, host: &mut impl TransformHost) {
        let Some(head) = self.buffer.head().copied() else {
            return;
        };
        debug!(tick = ?head.tick, "snapshot is over the teleport threshold, snapping");
        host.set_graphical_pose(&head.pose);
        self.clear_queue();
        self.teleported_tick = Some(head.tick);
    }

    fn advance(&mut self, host: &mut impl TransformHost, delta: f32) {
        let smoothed = self.smoothed_properties();
        let mut remaining = delta;
        // each iteration either returns or consumes one snapshot
        loop {
            let Some(head) = self.buffer.head().copied() else {
                self.move_rate = None;
                return;
            };
            let Some(rate) = self.move_rate.as_mut() else {
                self.start_segment_from_rendered(host);
                if self.move_rate.is_none() {
                    return;
                }
                continue;
            };
            let current = host.graphical_pose();
            let next = rate.advance(&current, &head.pose, remaining, smoothed);
            host.set_graphical_pose(&next);
            if !rate.is_complete() {
                return;
            }
            let leftover = -rate.time_remaining;
            self.buffer.dequeue();
            trace!(tick = ?head.tick, ?leftover, "reached snapshot");
            if self.start_segment(head.pose, Some(head.tick)) == SegmentStart::Teleport {
                self.teleport_to_head(host);
                return;
            }
            if leftover <= 0.0 {
                return;
            }
            remaining = leftover;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentStart {
    Started,
    Teleport,
    Empty,
}
