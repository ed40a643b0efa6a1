/*!
Weakly compressible SPH fluid simulation.

Particles are advanced with a leapfrog scheme: densities from poly6 kernel sums, pressures
from a stiff equation of state, pressure/viscosity/gravity forces and a reflecting box
boundary. The `platform` module of the binary only drives the simulation and prints
particle positions; everything numeric lives in [`simulation`].
*/

pub mod simulation;

pub use simulation::*;
