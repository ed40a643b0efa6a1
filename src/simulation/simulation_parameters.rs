use crate::floating_type_mod::FT;
use serde::{Deserialize, Serialize};

// volume = mass / density
pub const INIT_REST_DENSITY: FT = 998.;
pub const INIT_EOS_STIFFNESS: FT = 3.;
pub const INIT_EOS_POWER: i32 = 7;
pub const INIT_DENSITY_SMOOTHING_LENGTH: FT = 5.;
pub const INIT_DENSITY_TOLERANCE: FT = 0.000001;
pub const INIT_FORCE_SMOOTHING_LENGTH: FT = 1.;
pub const INIT_TIME_STEP: FT = 0.1;
pub const INIT_BOUNDARY_MAX: FT = 10.;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    // seed of the density sum and reference density of the equation of state
    pub rest_density: FT,

    // p = k * ((rho / rho_0)^power - 1)
    pub eos_stiffness: FT,
    pub eos_power: i32,

    pub density_smoothing_length: FT,

    // kernel weights below this value are not added to the density
    pub density_tolerance: FT,

    // smoothing length for the pressure and viscosity kernels
    pub force_smoothing_length: FT,

    // only used to bootstrap the half-step velocity in `initialize()`
    pub time_step: FT,

    pub init_boundary_handler: InitBoundaryHandlerType,

    // the box spans [0, boundary_max] on every axis
    pub boundary_max: FT,

    pub neighborhood_search_algorithm: NeighborhoodSearchAlgorithm,

    // panic on non-finite accelerations (slow)
    pub check_finite: bool,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            rest_density: INIT_REST_DENSITY,
            eos_stiffness: INIT_EOS_STIFFNESS,
            eos_power: INIT_EOS_POWER,
            density_smoothing_length: INIT_DENSITY_SMOOTHING_LENGTH,
            density_tolerance: INIT_DENSITY_TOLERANCE,
            force_smoothing_length: INIT_FORCE_SMOOTHING_LENGTH,
            time_step: INIT_TIME_STEP,
            init_boundary_handler: InitBoundaryHandlerType::Box,
            boundary_max: INIT_BOUNDARY_MAX,
            neighborhood_search_algorithm: NeighborhoodSearchAlgorithm::AllPairs,
            check_finite: false,
        }
    }
}

impl SimulationParams {
    /** The neighborhood structure has to answer queries for both kernels. */
    pub fn max_smoothing_length(&self) -> FT {
        FT::max(self.density_smoothing_length, self.force_smoothing_length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighborhoodSearchAlgorithm {
    // reference: every particle is a candidate of every other particle
    AllPairs,
    Grid,
    RStar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitBoundaryHandlerType {
    Box,
    NoBoundary,
}

#[test]
fn partial_yaml_uses_defaults() {
    let params: SimulationParams =
        serde_yaml::from_str("eos_stiffness: 7.5\nneighborhood_search_algorithm: Grid\n").unwrap();

    assert_eq!(params.eos_stiffness, 7.5);
    assert_eq!(params.neighborhood_search_algorithm, NeighborhoodSearchAlgorithm::Grid);
    assert_eq!(params.rest_density, INIT_REST_DENSITY);
    assert_eq!(params.eos_power, 7);
    assert_eq!(params.init_boundary_handler, InitBoundaryHandlerType::Box);
}
