pub mod boundary_handler;
pub mod concurrency;
pub mod integrator;
pub mod neighborhood_search;
pub mod particle;
pub mod scene;
pub mod simulation;
pub mod simulation_parameters;
pub mod sph_kernels;

#[cfg(feature = "double-precision")]
pub mod floating_type_mod {
    pub type FT = f64;
    pub use std::f64::consts::PI;
}

#[cfg(not(feature = "double-precision"))]
pub mod floating_type_mod {
    pub type FT = f32;
    pub use std::f32::consts::PI;
}

use floating_type_mod::FT;

use nalgebra::SVector;

pub type V<FT, const D: usize> = SVector<FT, D>;

pub type V3 = V<FT, 3>;
pub type V3I = V<i32, 3>;

pub fn vec3f(x: FT, y: FT, z: FT) -> V3 {
    [x, y, z].into()
}

pub fn v3_str(v: &V3) -> String {
    format!("[{:+.5}, {:+.5}, {:+.5}]", v.x, v.y, v.z)
}

pub use particle::{Particle, ParticleVec};
pub use scene::*;
pub use simulation::*;
