//! Bevy integration of the [`Smoother`].
//!
//! Add the [`TickSmoother`] component on the rendered entity, pointing at the entity moved by the
//! simulation (the anchor). The rendered entity is usually spawned as a child of the anchor.
//!
//! ```rust,ignore
//! let anchor = commands.spawn(Transform::default()).id();
//! commands.spawn((
//!     Transform::default(),
//!     ChildOf(anchor),
//!     TickSmoother::new(anchor, SmootherConfig::default()),
//! ));
//! ```
//!
//! The anchor is expected to be a root entity: its `Transform` is used as its world pose.
use crate::config::SmootherConfig;
use crate::error::{Result, SmoothingError};
use crate::host::TransformHost;
use crate::smoother::Smoother;
use bevy_app::prelude::*;
use bevy_derive::{Deref, DerefMut};
use bevy_ecs::prelude::*;
use bevy_time::{Fixed, Time};
use bevy_transform::components::Transform;
use bevy_transform::TransformSystems;
use tick_smoother_core::clock::NetworkClock;
use tick_smoother_core::pose::Pose;
use tick_smoother_core::tick::Tick;
use tracing::{trace, warn};

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum TickSmootherSystems {
    /// Advance the [`SmoothingClock`] and record the rendered poses before the simulation runs
    PreTick,
    /// Buffer the poses produced by the simulation
    PostTick,
    /// Move the rendered entities. Runs before transform propagation.
    Update,
}

/// Smoothing state of a rendered entity
#[derive(Component, Debug, Clone)]
pub struct TickSmoother {
    pub smoother: Smoother,
    /// Entity whose `Transform` is updated by the simulation
    pub anchor: Entity,
}

impl TickSmoother {
    pub fn new(anchor: Entity, config: SmootherConfig) -> Self {
        Self {
            smoother: Smoother::new(config),
            anchor,
        }
    }

    /// Mark the entity as controlled by the local peer
    pub fn with_owner(mut self, is_owner: bool) -> Self {
        self.smoother = self.smoother.with_owner(is_owner);
        self
    }
}

/// Tick and network statistics shared by all smoothers.
///
/// `local_tick` is incremented on every run of the fixed schedule. The round-trip time is not
/// measured here; the networking layer is expected to keep it up to date.
#[derive(Resource, Debug, Default, Clone, Copy, Deref, DerefMut)]
pub struct SmoothingClock(pub NetworkClock);

/// Trigger before a reconciliation, with the authoritative tick the client last had state for
#[derive(Event, Debug, Clone, Copy)]
pub struct PreReconcile {
    pub client_state_tick: Tick,
}

/// Trigger for every re-simulated tick with the corrected pose of the anchor
#[derive(Event, Debug, Clone, Copy)]
pub struct PostReplay {
    pub anchor: Entity,
    pub tick: Tick,
    pub pose: Pose,
}

/// Trigger to snap the entities rendered for `anchor` to the anchor's current pose
#[derive(Event, Debug, Clone, Copy)]
pub struct Teleport {
    pub anchor: Entity,
}

type AnchorQuery<'w, 's> = Query<'w, 's, &'static Transform, Without<TickSmoother>>;
type SmootherQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static mut TickSmoother,
        &'static mut Transform,
        Option<&'static ChildOf>,
    ),
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reparent {
    Detach,
    Attach,
}

/// [`TransformHost`] backed by the `Transform` of the rendered entity.
///
/// Changes to the hierarchy are recorded and applied through `Commands` afterwards.
struct EcsHost<'a> {
    anchor: Pose,
    transform: Mut<'a, Transform>,
    /// True if the rendered entity is a child of the anchor
    attached: bool,
    reparent: Option<Reparent>,
}

impl<'a> EcsHost<'a> {
    fn new(
        anchors: &AnchorQuery,
        anchor: Entity,
        transform: Mut<'a, Transform>,
        child_of: Option<&ChildOf>,
    ) -> Result<Self> {
        let anchor_pose = anchors
            .get(anchor)
            .map(|transform| Pose::from(*transform))
            .map_err(|_| SmoothingError::NotAttached)?;
        Ok(Self {
            anchor: anchor_pose,
            transform,
            attached: child_of.is_some_and(|child_of| child_of.parent() == anchor),
            reparent: None,
        })
    }

    fn apply(self, commands: &mut Commands, entity: Entity, anchor: Entity) {
        match self.reparent {
            Some(Reparent::Detach) => {
                commands.entity(entity).try_remove::<ChildOf>();
            }
            Some(Reparent::Attach) => {
                commands.entity(entity).try_insert(ChildOf(anchor));
            }
            None => {}
        }
    }
}

impl TransformHost for EcsHost<'_> {
    fn anchor_pose(&self) -> Pose {
        self.anchor
    }

    fn graphical_pose(&self) -> Pose {
        let local = Pose::from(*self.transform);
        if self.attached {
            self.anchor.compose(&local)
        } else {
            local
        }
    }

    fn set_graphical_pose(&mut self, pose: &Pose) {
        let local = if self.attached {
            pose.relative_to(&self.anchor)
        } else {
            *pose
        };
        *self.transform = Transform::from(&local);
    }

    fn detach_graphical(&mut self) -> bool {
        if self.attached {
            let world = self.graphical_pose();
            *self.transform = Transform::from(&world);
            self.attached = false;
            self.reparent = Some(Reparent::Detach);
        }
        true
    }

    fn reattach_graphical(&mut self, local: &Pose) {
        *self.transform = Transform::from(local);
        if !self.attached {
            self.attached = true;
            self.reparent = Some(Reparent::Attach);
        }
    }
}

#[derive(Default)]
pub struct TickSmootherPlugin;

impl TickSmootherPlugin {
    fn increment_tick(mut clock: ResMut<SmoothingClock>, time: Res<Time<Fixed>>) {
        clock.tick_duration = time.timestep();
        clock.local_tick += 1u32;
    }

    fn pre_tick(
        clock: Res<SmoothingClock>,
        anchors: AnchorQuery,
        mut query: SmootherQuery,
        mut commands: Commands,
    ) {
        for (entity, mut tick_smoother, transform, child_of) in query.iter_mut() {
            let anchor = tick_smoother.anchor;
            let mut host = match EcsHost::new(&anchors, anchor, transform, child_of) {
                Ok(host) => host,
                Err(error) => {
                    trace!(?entity, ?anchor, ?error, "skipping pre-tick");
                    continue;
                }
            };
            tick_smoother.smoother.set_clock(&clock);
            tick_smoother.smoother.pre_tick(&mut host);
            host.apply(&mut commands, entity, anchor);
        }
    }

    fn post_tick(
        clock: Res<SmoothingClock>,
        anchors: AnchorQuery,
        mut query: SmootherQuery,
        mut commands: Commands,
    ) {
        for (entity, mut tick_smoother, transform, child_of) in query.iter_mut() {
            let anchor = tick_smoother.anchor;
            let mut host = match EcsHost::new(&anchors, anchor, transform, child_of) {
                Ok(host) => host,
                Err(error) => {
                    trace!(?entity, ?anchor, ?error, "skipping post-tick");
                    continue;
                }
            };
            let authoritative = host.anchor_pose();
            tick_smoother
                .smoother
                .post_tick(&mut host, clock.local_tick, &authoritative);
            host.apply(&mut commands, entity, anchor);
        }
    }

    fn update(
        time: Res<Time>,
        anchors: AnchorQuery,
        mut query: SmootherQuery,
        mut commands: Commands,
    ) {
        let delta = time.delta_secs();
        for (entity, mut tick_smoother, transform, child_of) in query.iter_mut() {
            let anchor = tick_smoother.anchor;
            let Ok(mut host) = EcsHost::new(&anchors, anchor, transform, child_of) else {
                continue;
            };
            tick_smoother.smoother.update(&mut host, delta);
            host.apply(&mut commands, entity, anchor);
        }
    }

    fn initialize(
        trigger: On<Add, TickSmoother>,
        clock: Res<SmoothingClock>,
        anchors: AnchorQuery,
        mut query: SmootherQuery,
        mut commands: Commands,
    ) {
        let Ok((entity, mut tick_smoother, transform, child_of)) = query.get_mut(trigger.entity)
        else {
            return;
        };
        let anchor = tick_smoother.anchor;
        let mut host = match EcsHost::new(&anchors, anchor, transform, child_of) {
            Ok(host) => host,
            Err(error) => {
                warn!(?entity, ?anchor, ?error, "could not initialize tick smoother");
                return;
            }
        };
        tick_smoother.smoother.initialize(&mut host, &clock);
        host.apply(&mut commands, entity, anchor);
    }

    fn detach(
        trigger: On<Remove, TickSmoother>,
        anchors: AnchorQuery,
        mut query: SmootherQuery,
        mut commands: Commands,
    ) {
        let Ok((entity, mut tick_smoother, transform, child_of)) = query.get_mut(trigger.entity)
        else {
            return;
        };
        let anchor = tick_smoother.anchor;
        let Ok(mut host) = EcsHost::new(&anchors, anchor, transform, child_of) else {
            // the anchor is gone, there is nothing to re-attach to
            return;
        };
        tick_smoother.smoother.detach(&mut host);
        host.apply(&mut commands, entity, anchor);
    }

    fn pre_reconcile(
        trigger: On<PreReconcile>,
        clock: Res<SmoothingClock>,
        mut query: Query<&mut TickSmoother>,
    ) {
        for mut tick_smoother in query.iter_mut() {
            tick_smoother
                .smoother
                .pre_reconcile(&clock, trigger.client_state_tick);
        }
    }

    fn post_replay(trigger: On<PostReplay>, anchors: AnchorQuery, mut query: SmootherQuery) {
        for (_, mut tick_smoother, transform, child_of) in query.iter_mut() {
            let anchor = tick_smoother.anchor;
            if anchor != trigger.anchor {
                continue;
            }
            let Ok(host) = EcsHost::new(&anchors, anchor, transform, child_of) else {
                continue;
            };
            tick_smoother
                .smoother
                .post_replay(&host, trigger.tick, &trigger.pose);
        }
    }

    fn teleport(
        trigger: On<Teleport>,
        anchors: AnchorQuery,
        mut query: SmootherQuery,
        mut commands: Commands,
    ) {
        for (entity, mut tick_smoother, transform, child_of) in query.iter_mut() {
            let anchor = tick_smoother.anchor;
            if anchor != trigger.anchor {
                continue;
            }
            let Ok(mut host) = EcsHost::new(&anchors, anchor, transform, child_of) else {
                continue;
            };
            tick_smoother.smoother.teleport(&mut host);
            host.apply(&mut commands, entity, anchor);
        }
    }
}

impl Plugin for TickSmootherPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SmoothingClock>();

        // SETS
        app.configure_sets(
            PostUpdate,
            TickSmootherSystems::Update.before(TransformSystems::Propagate),
        );

        // SYSTEMS
        app.add_systems(
            FixedFirst,
            (Self::increment_tick, Self::pre_tick)
                .chain()
                .in_set(TickSmootherSystems::PreTick),
        );
        app.add_systems(
            FixedLast,
            Self::post_tick.in_set(TickSmootherSystems::PostTick),
        );
        app.add_systems(PostUpdate, Self::update.in_set(TickSmootherSystems::Update));

        // OBSERVERS
        app.add_observer(Self::initialize);
        app.add_observer(Self::detach);
        app.add_observer(Self::pre_reconcile);
        app.add_observer(Self::post_replay);
        app.add_observer(Self::teleport);
    }
}
