use crate::prelude::*;
use approx::assert_relative_eq;
use bevy_app::prelude::*;
use bevy_ecs::prelude::*;
use bevy_math::Vec3;
use bevy_time::{Fixed, Time, TimePlugin, TimeUpdateStrategy};
use bevy_transform::components::Transform;
use bevy_transform::TransformPlugin;
use core::time::Duration;
use test_log::test;

const TICK_DURATION: Duration = Duration::from_millis(20);
const FRAME_DURATION: Duration = Duration::from_millis(10);

#[derive(Component)]
struct Anchor;

/// Distance the anchor moves along X on every tick
#[derive(Resource)]
struct Velocity(f32);

fn move_anchor(velocity: Res<Velocity>, mut query: Query<&mut Transform, With<Anchor>>) {
    for mut transform in query.iter_mut() {
        transform.translation.x += velocity.0;
    }
}

struct Stepper {
    app: App,
    anchor: Entity,
    graphical: Entity,
}

impl Stepper {
    /// Spawn an anchor at the origin and a rendered child with the given local position
    fn new(smoother: impl FnOnce(Entity) -> TickSmoother, local: Vec3) -> Self {
        let mut app = App::new();
        app.add_plugins((TimePlugin, TransformPlugin, TickSmootherPlugin));
        app.insert_resource(Time::<Fixed>::from_duration(TICK_DURATION));
        app.insert_resource(TimeUpdateStrategy::ManualDuration(FRAME_DURATION));
        app.insert_resource(Velocity(1.0));
        app.add_systems(FixedUpdate, move_anchor);
        let anchor = app
            .world_mut()
            .spawn((Anchor, Transform::default()))
            .id();
        let graphical = app
            .world_mut()
            .spawn((
                Transform::from_translation(local),
                ChildOf(anchor),
                smoother(anchor),
            ))
            .id();
        // the first update has a zero delta
        app.update();
        Self {
            app,
            anchor,
            graphical,
        }
    }

    fn frame_step(&mut self, frames: usize) {
        for _ in 0..frames {
            self.app.update();
        }
    }

    fn smoother(&self) -> &Smoother {
        &self
            .app
            .world()
            .get::<TickSmoother>(self.graphical)
            .unwrap()
            .smoother
    }

    fn clock(&self) -> NetworkClock {
        **self.app.world().resource::<SmoothingClock>()
    }

    fn anchor_pose(&self) -> Pose {
        Pose::from(*self.app.world().get::<Transform>(self.anchor).unwrap())
    }

    fn graphical_pose(&self) -> Pose {
        let world = self.app.world();
        let local = Pose::from(*world.get::<Transform>(self.graphical).unwrap());
        match world.get::<ChildOf>(self.graphical) {
            Some(child_of) if child_of.parent() == self.anchor => {
                self.anchor_pose().compose(&local)
            }
            _ => local,
        }
    }

    fn set_velocity(&mut self, velocity: f32) {
        self.app.world_mut().resource_mut::<Velocity>().0 = velocity;
    }
}

fn default_smoother(anchor: Entity) -> TickSmoother {
    TickSmoother::new(anchor, SmootherConfig::default())
}

#[test]
fn test_rendered_entity_trails_anchor() {
    let mut stepper = Stepper::new(default_smoother, Vec3::ZERO);
    assert_eq!(stepper.smoother().status(), SmootherStatus::Idle);

    // one tick every two frames
    stepper.frame_step(20);
    assert_eq!(stepper.clock().local_tick, Tick(10));
    assert_eq!(stepper.clock().tick_duration, TICK_DURATION);
    let anchor_x = stepper.anchor_pose().position.x;
    assert_eq!(anchor_x, 10.0);
    let x = stepper.graphical_pose().position.x;
    assert!(x < anchor_x && x > anchor_x - 5.0, "x = {x}");
    assert!(!stepper.smoother().buffer().is_empty());

    // once the anchor stops, the rendered entity catches up
    stepper.set_velocity(0.0);
    stepper.frame_step(40);
    assert_relative_eq!(stepper.graphical_pose().position.x, anchor_x, epsilon = 1e-3);
    let local = stepper.app.world().get::<Transform>(stepper.graphical).unwrap();
    assert_relative_eq!(local.translation.x, 0.0, epsilon = 1e-3);
}

#[test]
fn test_offset_is_preserved() {
    let mut stepper = Stepper::new(default_smoother, Vec3::Y);
    assert!(stepper.smoother().offset().position.distance(Vec3::Y) < 1e-5);
    stepper.frame_step(20);
    stepper.set_velocity(0.0);
    stepper.frame_step(40);
    let pose = stepper.graphical_pose();
    assert!(pose.position.distance(Vec3::new(10.0, 1.0, 0.0)) < 1e-3);
}

#[test]
fn test_detached_rendering_is_reattached_on_removal() {
    let mut stepper = Stepper::new(
        |anchor| TickSmoother::new(anchor, SmootherConfig::default().with_detach(true)),
        Vec3::Y,
    );
    assert!(stepper.app.world().get::<ChildOf>(stepper.graphical).is_none());
    assert!(stepper.graphical_pose().position.distance(Vec3::Y) < 1e-5);

    stepper.frame_step(20);
    let x = stepper.graphical_pose().position.x;
    assert!(x > 0.0 && x < 10.0, "x = {x}");

    stepper
        .app
        .world_mut()
        .entity_mut(stepper.graphical)
        .remove::<TickSmoother>();
    stepper.frame_step(1);
    let world = stepper.app.world();
    assert_eq!(
        world.get::<ChildOf>(stepper.graphical).map(ChildOf::parent),
        Some(stepper.anchor)
    );
    let local = world.get::<Transform>(stepper.graphical).unwrap();
    assert!(local.translation.distance(Vec3::Y) < 1e-5);
}

#[test]
fn test_despawn_with_detached_rendering() {
    let mut stepper = Stepper::new(
        |anchor| TickSmoother::new(anchor, SmootherConfig::default().with_detach(true)),
        Vec3::Y,
    );
    stepper.frame_step(4);
    stepper.app.world_mut().despawn(stepper.graphical);
    stepper.frame_step(4);
    assert!(stepper.app.world().get_entity(stepper.graphical).is_err());
}

#[test]
fn test_teleport_event() {
    let mut stepper = Stepper::new(default_smoother, Vec3::ZERO);
    stepper.frame_step(20);
    stepper.set_velocity(0.0);

    let anchor = stepper.anchor;
    stepper.app.world_mut().trigger(Teleport { anchor });
    assert!(stepper.smoother().buffer().is_empty());
    assert_relative_eq!(stepper.graphical_pose().position.x, 10.0, epsilon = 1e-4);

    stepper.frame_step(10);
    assert_relative_eq!(stepper.graphical_pose().position.x, 10.0, epsilon = 1e-4);
}

#[test]
fn test_pre_reconcile_event() {
    let mut stepper = Stepper::new(default_smoother, Vec3::ZERO);
    stepper.frame_step(50);
    assert_eq!(stepper.clock().local_tick, Tick(25));

    stepper.app.world_mut().trigger(PreReconcile {
        client_state_tick: Tick(5),
    });
    // 20 ticks of delay with the moderate multiplier
    assert_eq!(stepper.smoother().current_ticks(), 21);
}

#[test]
fn test_post_replay_event() {
    let mut stepper = Stepper::new(default_smoother, Vec3::ZERO);
    stepper.frame_step(20);
    let newest = stepper.smoother().buffer().newest().unwrap().tick;
    let corrected = Pose::from_position(Vec3::new(50.0, 0.0, 0.0));

    // corrections for another anchor are ignored
    stepper.app.world_mut().trigger(PostReplay {
        anchor: Entity::PLACEHOLDER,
        tick: newest,
        pose: corrected,
    });
    let buffered = stepper.smoother().buffer().get(newest).unwrap().pose;
    assert_relative_eq!(buffered.position.x, 10.0, epsilon = 1e-5);

    let anchor = stepper.anchor;
    stepper.app.world_mut().trigger(PostReplay {
        anchor,
        tick: newest,
        pose: corrected,
    });
    let buffered = stepper.smoother().buffer().get(newest).unwrap().pose;
    assert_relative_eq!(buffered.position.x, 50.0, epsilon = 1e-5);
}

#[test]
fn test_post_replay_ignored_for_owner() {
    let mut stepper = Stepper::new(
        |anchor| TickSmoother::new(anchor, SmootherConfig::default()).with_owner(true),
        Vec3::ZERO,
    );
    stepper.frame_step(20);
    let newest = stepper.smoother().buffer().newest().unwrap().tick;
    let anchor = stepper.anchor;
    stepper.app.world_mut().trigger(PostReplay {
        anchor,
        tick: newest,
        pose: Pose::from_position(Vec3::new(50.0, 0.0, 0.0)),
    });
    let buffered = stepper.smoother().buffer().get(newest).unwrap().pose;
    assert_relative_eq!(buffered.position.x, 10.0, epsilon = 1e-5);
}

#[test]
fn test_missing_anchor() {
    let mut app = App::new();
    app.add_plugins((TimePlugin, TransformPlugin, TickSmootherPlugin));
    app.insert_resource(Time::<Fixed>::from_duration(TICK_DURATION));
    app.insert_resource(TimeUpdateStrategy::ManualDuration(FRAME_DURATION));
    let graphical = app
        .world_mut()
        .spawn((
            Transform::default(),
            TickSmoother::new(Entity::PLACEHOLDER, SmootherConfig::default()),
        ))
        .id();
    for _ in 0..10 {
        app.update();
    }
    let smoother = &app.world().get::<TickSmoother>(graphical).unwrap().smoother;
    assert_eq!(smoother.status(), SmootherStatus::Uninitialized);
}
