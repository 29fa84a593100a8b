//! Capability interface through which the smoother reads and writes the scene graph.
//!
//! The smoother deals with two objects:
//! - the anchor: the tick-driven object, whose pose is authoritative and only changes on ticks
//! - the graphical object: what is actually rendered, moved every frame by the smoother
//!
//! The graphical object is usually a child of the anchor. It can be detached so that moving the
//! anchor on a tick doesn't drag it along.
use tick_smoother_core::pose::Pose;

pub trait TransformHost {
    /// World pose of the tick-driven object
    fn anchor_pose(&self) -> Pose;

    /// World pose of the rendered object
    fn graphical_pose(&self) -> Pose;

    /// Move the rendered object to the given world pose
    fn set_graphical_pose(&mut self, pose: &Pose);

    /// Detach the rendered object from the anchor, preserving its world pose.
    ///
    /// Returns false if the host doesn't support re-parenting.
    fn detach_graphical(&mut self) -> bool;

    /// Put the rendered object back under the anchor with the given local pose
    fn reattach_graphical(&mut self, local: &Pose);
}

/// [`TransformHost`] that keeps the two poses in memory.
///
/// Mostly used for tests and for hosts without a scene graph.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryHost {
    anchor: Pose,
    /// Local pose relative to the anchor if attached, world pose otherwise
    graphical: Pose,
    attached: bool,
}

impl MemoryHost {
    /// The graphical object is a child of the anchor, with the given local pose
    pub fn attached(anchor: Pose, local: Pose) -> Self {
        Self {
            anchor,
            graphical: local,
            attached: true,
        }
    }

    /// The graphical object is a root object at the given world pose
    pub fn detached(anchor: Pose, world: Pose) -> Self {
        Self {
            anchor,
            graphical: world,
            attached: false,
        }
    }

    /// Move the anchor; an attached graphical object follows it
    pub fn set_anchor(&mut self, pose: Pose) {
        self.anchor = pose;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

impl TransformHost for MemoryHost {
    fn anchor_pose(&self) -> Pose {
        self.anchor
    }

    fn graphical_pose(&self) -> Pose {
        if self.attached {
            self.anchor.compose(&self.graphical)
        } else {
            self.graphical
        }
    }

    fn set_graphical_pose(&mut self, pose: &Pose) {
        self.graphical = if self.attached {
            pose.relative_to(&self.anchor)
        } else {
            *pose
        };
    }

    fn detach_graphical(&mut self) -> bool {
        if self.attached {
            self.graphical = self.graphical_pose();
            self.attached = false;
        }
        true
    }

    fn reattach_graphical(&mut self, local: &Pose) {
        self.attached = true;
        self.graphical = *local;
    }
}
