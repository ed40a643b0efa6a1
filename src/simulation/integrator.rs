/*!
Leapfrog (kick-drift) time integration.

Velocities live at half steps: `velocity_half` holds `v(t - dt/2)` between steps, the
reported `velocity` is the midpoint estimate `v(t)`.
*/

use crate::{floating_type_mod::FT, V3};

/**
 * Bootstraps the staggered velocity before the first step.
 *
 * `v(-dt/2) = v(0) - a(0) * dt / 2`
 */
#[inline]
pub fn initial_velocity_half(velocity: V3, acceleration: V3, dt: FT) -> V3 {
    velocity - (acceleration * dt) / 2.
}

/// Candidate state after one leapfrog step, before any boundary correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeapfrogState {
    pub position: V3,
    pub velocity: V3,
    pub velocity_half: V3,
}

/**
 * One leapfrog step of a single particle.
 *
 * ```text
 * v(t + dt/2) = v(t - dt/2) + a(t) * dt
 * x(t + dt)   = x(t) + v(t + dt/2) * dt
 * v(t)        = (v(t - dt/2) + v(t + dt/2)) / 2
 * ```
 */
#[inline]
pub fn leapfrog_step(position: V3, velocity_half: V3, acceleration: V3, dt: FT) -> LeapfrogState {
    let velocity_half_next = velocity_half + acceleration * dt;
    LeapfrogState {
        position: position + velocity_half_next * dt,
        velocity: (velocity_half + velocity_half_next) / 2.,
        velocity_half: velocity_half_next,
    }
}
