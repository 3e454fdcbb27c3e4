use std::time::Duration;

use skirmish_core::{planar_distance, MovementCapability, Vec3};

/// Kinematic body that walks straight toward its destination on the ground plane.
#[derive(Clone, Debug)]
pub(crate) struct Locomotion {
    position: Vec3,
    facing: Vec3,
    speed: f32,
    footprint: u32,
    destination: Option<Vec3>,
    stopping_distance: f32,
}

impl Locomotion {
    pub(crate) fn new(position: Vec3, speed: f32, footprint: u32) -> Self {
        Self {
            position,
            facing: Vec3::Z,
            speed: speed.max(0.0),
            footprint: footprint.max(1),
            destination: None,
            stopping_distance: 0.0,
        }
    }

    /// Immobile bodies never expose a movement capability.
    pub(crate) fn is_mobile(&self) -> bool {
        self.speed > 0.0
    }

    pub(crate) fn facing(&self) -> Vec3 {
        self.facing
    }

    pub(crate) fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    /// Integrates `dt` of travel toward the current destination.
    pub(crate) fn advance(&mut self, dt: Duration) {
        let Some(destination) = self.destination else {
            return;
        };

        let remaining = planar_distance(self.position, destination);
        if remaining > self.stopping_distance {
            let step = (self.speed * dt.as_secs_f32()).min(remaining);
            let direction = Vec3::new(
                destination.x - self.position.x,
                0.0,
                destination.z - self.position.z,
            ) / remaining;
            self.position += direction * step;
            self.facing = direction;
        }

        if planar_distance(self.position, destination) <= self.stopping_distance {
            self.destination = None;
        }
    }
}

impl MovementCapability for Locomotion {
    fn move_to(&mut self, destination: Vec3, stopping_distance: f32) {
        self.stopping_distance = stopping_distance.max(0.0);
        if planar_distance(self.position, destination) <= self.stopping_distance {
            self.destination = None;
        } else {
            self.destination = Some(destination);
        }
    }

    fn stop_movement(&mut self) {
        self.destination = None;
    }

    fn is_moving(&self) -> bool {
        self.destination.is_some()
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn footprint(&self) -> u32 {
        self.footprint
    }

    fn face_towards(&mut self, point: Vec3) {
        let offset = Vec3::new(point.x - self.position.x, 0.0, point.z - self.position.z);
        if offset.length_squared() > f32::EPSILON {
            self.facing = offset.normalize();
        }
    }
}
