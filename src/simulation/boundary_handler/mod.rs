use crate::{floating_type_mod::FT, simulation_parameters::{InitBoundaryHandlerType, SimulationParams}, V3};

mod box_boundary_handler;

use enum_dispatch::enum_dispatch;
pub use box_boundary_handler::BoxBoundaryHandler;

#[enum_dispatch]
pub trait BoundaryHandlerTrait: Sync {
    /// Corrects the candidate state of one particle after the integration step.
    fn correct(&self, position: &mut V3, velocity: &mut V3);
}

#[enum_dispatch(BoundaryHandlerTrait)]
pub enum BoundaryHandler {
    BoxBoundaryHandler,
    NoBoundaryHandler,
}

impl BoundaryHandler {
    pub fn new(simulation_params: SimulationParams) -> BoundaryHandler {
        match simulation_params.init_boundary_handler {
            InitBoundaryHandlerType::Box => BoxBoundaryHandler::new(simulation_params.boundary_max).into(),
            InitBoundaryHandlerType::NoBoundary => NoBoundaryHandler {}.into(),
        }
    }

    pub fn max(&self) -> Option<FT> {
        match self {
            BoundaryHandler::BoxBoundaryHandler(bh) => Some(bh.max()),
            BoundaryHandler::NoBoundaryHandler(_) => None,
        }
    }
}

/// Particles can leave the domain freely.
pub struct NoBoundaryHandler {}

impl BoundaryHandlerTrait for NoBoundaryHandler {
    fn correct(&self, _position: &mut V3, _velocity: &mut V3) {}
}
