use crate::{floating_type_mod::FT, V3};

use super::BoundaryHandlerTrait;

/**
 * Reflects particles at the faces of the box `[0, max]` on every axis.
 *
 * Each axis is handled on its own. A coordinate above `max` is mirrored to `2 * max - x`,
 * one below zero to `-x`, and the velocity component flips its sign. Coordinates exactly on
 * a face are left alone. There is only one reflection per axis and step, so a particle that
 * overshoots by more than the box width ends up outside.
 */
pub struct BoxBoundaryHandler {
    max: FT,
}

impl BoxBoundaryHandler {
    pub fn new(max: FT) -> BoxBoundaryHandler {
        BoxBoundaryHandler { max }
    }

    pub fn max(&self) -> FT {
        self.max
    }
}

impl BoundaryHandlerTrait for BoxBoundaryHandler {
    fn correct(&self, position: &mut V3, velocity: &mut V3) {
        for d in 0..3 {
            if position[d] > self.max {
                position[d] = 2. * self.max - position[d];
                velocity[d] = -velocity[d];
            } else if position[d] < 0. {
                position[d] = -position[d];
                velocity[d] = -velocity[d];
            }
        }
    }
}
