use crate::simulation::boundary_handler::{BoundaryHandler, BoundaryHandlerTrait};
use crate::simulation::concurrency::{par_iter_mut1, par_iter_mut3};
use crate::simulation::integrator::{initial_velocity_half, leapfrog_step};
use crate::simulation::neighborhood_search::{NeighborhoodSearch, NeighborhoodSearchTrait};
use crate::simulation::particle::{Particle, ParticleVec};
use crate::simulation::simulation_parameters::SimulationParams;
use crate::simulation::sph_kernels::{poly6, spiky_gradient, viscosity_laplacian};
use crate::{floating_type_mod::FT, V3};

use log::{debug, log_enabled, trace, warn, Level};
use num_traits::Float;

use std::collections::HashMap;
use std::fmt::{Display, Write};
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Counter {
    values: Vec<Duration>,
    last_start: Instant,
}
impl Counter {
    fn new() -> Self {
        Counter {
            last_start: Instant::now(),
            values: Vec::new(),
        }
    }

    fn begin(&mut self) {
        self.last_start = Instant::now();
    }

    fn end(&mut self) {
        self.values.push(Instant::now() - self.last_start);
    }

    fn avg(&self) -> Duration {
        self.values.iter().cloned().sum::<Duration>() / self.values.len() as u32
    }

    fn sum(&self) -> Duration {
        self.values.iter().cloned().sum::<Duration>()
    }
}

struct PerformanceCounters {
    counters: HashMap<String, Counter>,
    enabled: bool,
}
impl PerformanceCounters {
    fn new(enabled: bool) -> PerformanceCounters {
        PerformanceCounters {
            counters: HashMap::default(),
            enabled,
        }
    }

    fn begin(&mut self, id: &str) {
        if self.enabled {
            self.counters
                .entry(id.to_string())
                .or_insert_with(Counter::new)
                .begin();
        }
    }

    fn end(&mut self, id: &str) {
        if self.enabled {
            if let Some(counter) = self.counters.get_mut(id) {
                counter.end();
            }
        }
    }
}

#[inline]
fn assert_vector_finite(v: &V3, name: &str) {
    for d in 0..3 {
        assert!(v[d].is_finite(), "Assertion '{}[{}].is_finite()' failed!", name, d);
    }
}

/**
 * Stiff equation of state.
 *
 * `p = k * ((rho / rho_0)^power - 1)` with the global stiffness and rest density of the
 * parameters. The material constants stored on the particles are not used here.
 */
pub fn equation_of_state(density: FT, simulation_params: SimulationParams) -> FT {
    simulation_params.eos_stiffness
        * ((density / simulation_params.rest_density).powi(simulation_params.eos_power) - 1.)
}

/**
 * Owns the particles and advances them with
 * neighborhood -> density -> pressure -> forces -> leapfrog + boundary.
 *
 * Every stage finishes for all particles before the next one starts and only writes the
 * attribute it computes, so all particles of a stage see the same snapshot.
 */
pub struct ParticleSystem {
    particles: ParticleVec,
    gravity: V3,
    simulation_params: SimulationParams,
    boundary_handler: BoundaryHandler,
    neighborhood_search: NeighborhoodSearch,

    time: FT,
    step_number: usize,
    initialized: bool,

    pcounters: PerformanceCounters,
}

impl ParticleSystem {
    pub fn new(gravity: V3) -> Self {
        Self::with_params(gravity, SimulationParams::default())
    }

    pub fn with_params(gravity: V3, simulation_params: SimulationParams) -> Self {
        ParticleSystem {
            particles: ParticleVec::default(),
            gravity,
            simulation_params,
            boundary_handler: BoundaryHandler::new(simulation_params),
            neighborhood_search: NeighborhoodSearch::new(simulation_params.neighborhood_search_algorithm),
            time: 0.,
            step_number: 0,
            initialized: false,
            pcounters: PerformanceCounters::new(false),
        }
    }

    /// Appends a particle. The mass is not validated, it has to be positive.
    pub fn add_particle(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    pub fn set_counters_enabled(&mut self, enabled: bool) {
        self.pcounters.enabled = enabled;
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn particle(&self, i: usize) -> Particle {
        self.particles.get(i)
    }

    pub fn particles(&self) -> impl Iterator<Item = Particle> + '_ {
        (0..self.num_particles()).map(move |i| self.particles.get(i))
    }

    pub fn positions(&self) -> &[V3] {
        &self.particles.position
    }

    pub fn velocities(&self) -> &[V3] {
        &self.particles.velocity
    }

    pub fn gravity(&self) -> V3 {
        self.gravity
    }

    pub fn params(&self) -> SimulationParams {
        self.simulation_params
    }

    pub fn boundary_handler(&self) -> &BoundaryHandler {
        &self.boundary_handler
    }

    pub fn time(&self) -> FT {
        self.time
    }

    pub fn step_number(&self) -> usize {
        self.step_number
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /**
     * Computes densities, pressures and accelerations for the initial state and bootstraps
     * the half-step velocities with `time_step`. Has to be called once before `update`.
     */
    pub fn initialize(&mut self) {
        if self.initialized {
            warn!("initialize() called more than once, restarting the leapfrog scheme");
        }

        self.compute_all_accelerations();
        self.initialize_leapfrog(self.simulation_params.time_step);
        self.initialized = true;

        debug!("initialized {} particles", self.num_particles());
    }

    /// Advances all particles by `timestep`.
    pub fn update(&mut self, timestep: FT) {
        if !self.initialized {
            warn!("update() called before initialize(), the half-step velocities are not bootstrapped");
        }

        self.pcounters.begin("simulation-step");

        self.compute_all_accelerations();
        self.leapfrog(timestep);

        self.time += timestep;
        self.step_number += 1;

        self.pcounters.end("simulation-step");

        debug!(
            "step {:05}: t={:.4} {} particles",
            self.step_number,
            self.time,
            self.num_particles()
        );
    }

    fn compute_all_accelerations(&mut self) {
        self.pcounters.begin("neighborhood");
        self.neighborhood_search
            .rebuild(&self.particles.position, self.simulation_params.max_smoothing_length());
        self.pcounters.end("neighborhood");

        self.pcounters.begin("density");
        self.calculate_all_particle_densities();
        self.pcounters.end("density");

        self.pcounters.begin("pressure");
        self.calculate_all_particle_pressures();
        self.pcounters.end("pressure");

        self.pcounters.begin("forces");
        self.calculate_all_particle_accels();
        self.pcounters.end("forces");
    }

    /**
     * The sum starts at the rest density which stands in for the self contribution, so a
     * particle without neighbors reports exactly the rest density.
     */
    fn calculate_particle_density(
        i: usize,
        position: &[V3],
        mass: &[FT],
        neighborhood_search: &NeighborhoodSearch,
        simulation_params: SimulationParams,
    ) -> FT {
        let h = simulation_params.density_smoothing_length;

        let mut density_acc = simulation_params.rest_density;
        neighborhood_search.other_neighbors_within(position, i, h, |j| {
            let weight = poly6(position[i] - position[j], h);

            // skip negligible (and the negative out-of-support) contributions
            if weight > simulation_params.density_tolerance {
                density_acc += weight * mass[j];
            }
        });

        density_acc
    }

    fn calculate_all_particle_densities(&mut self) {
        let particles = &mut self.particles;
        let neighborhood_search = &self.neighborhood_search;
        let simulation_params = self.simulation_params;

        par_iter_mut1(&mut particles.density, |i, p_density| {
            *p_density = Self::calculate_particle_density(
                i,
                &particles.position,
                &particles.mass,
                neighborhood_search,
                simulation_params,
            );
        });
    }

    fn calculate_all_particle_pressures(&mut self) {
        let particles = &mut self.particles;
        let simulation_params = self.simulation_params;

        par_iter_mut1(&mut particles.pressure, |i, p_pressure| {
            *p_pressure = equation_of_state(particles.density[i], simulation_params);
        });
    }

    /**
     * `a_i = (g * m_i - f_pressure + f_viscosity) / m_i`
     *
     * Both sums skip `i` itself and run in ascending index order.
     */
    fn calculate_particle_accel(
        i: usize,
        particles: &ParticleVec,
        gravity: V3,
        neighborhood_search: &NeighborhoodSearch,
        simulation_params: SimulationParams,
    ) -> V3 {
        let h = simulation_params.force_smoothing_length;
        let position = &particles.position;
        let velocity = &particles.velocity;
        let mass = &particles.mass;
        let pressure = &particles.pressure;

        let gravity_force = gravity * mass[i];

        let mut pressure_force = V3::zeros();
        let mut viscosity_force = V3::zeros();
        neighborhood_search.other_neighbors_within(position, i, h, |j| {
            let x_ij = position[i] - position[j];
            let volume_j = particles.volume(j);

            let pressure_coeff = (pressure[i] + pressure[j]) / 2. * volume_j;
            pressure_force += spiky_gradient(x_ij, h) * pressure_coeff;

            let viscosity_coeff = (velocity[j] - velocity[i]) * volume_j;
            viscosity_force += viscosity_coeff * viscosity_laplacian(x_ij, h);
        });

        let force = gravity_force - pressure_force + viscosity_force;

        // scaled by mass, not by density
        force / mass[i]
    }

    fn calculate_all_particle_accels(&mut self) {
        let particles = &mut self.particles;
        let neighborhood_search = &self.neighborhood_search;
        let simulation_params = self.simulation_params;
        let gravity = self.gravity;

        let mut acceleration = std::mem::take(&mut particles.acceleration);
        {
            let particles: &ParticleVec = particles;
            par_iter_mut1(&mut acceleration, |i, p_accel| {
                *p_accel = Self::calculate_particle_accel(i, particles, gravity, neighborhood_search, simulation_params);
                if simulation_params.check_finite {
                    assert_vector_finite(p_accel, "acceleration");
                }
            });
        }
        particles.acceleration = acceleration;
    }

    fn initialize_leapfrog(&mut self, dt: FT) {
        let particles = &mut self.particles;

        par_iter_mut1(&mut particles.velocity_half, |i, p_velocity_half| {
            *p_velocity_half = initial_velocity_half(particles.velocity[i], particles.acceleration[i], dt);
        });
    }

    fn leapfrog(&mut self, dt: FT) {
        if log_enabled!(Level::Trace) {
            for i in 0..self.num_particles() {
                trace!("particle {} (step {}):\n{}", i, self.step_number, self.particles.get(i));
            }
        }

        self.pcounters.begin("integrate");

        let particles = &mut self.particles;
        let boundary_handler = &self.boundary_handler;

        par_iter_mut3(
            &mut particles.position,
            &mut particles.velocity,
            &mut particles.velocity_half,
            |i, p_position, p_velocity, p_velocity_half| {
                let state = leapfrog_step(*p_position, *p_velocity_half, particles.acceleration[i], dt);

                let mut position = state.position;
                let mut velocity = state.velocity;
                boundary_handler.correct(&mut position, &mut velocity);

                // the half-step velocity is committed without boundary correction
                *p_position = position;
                *p_velocity = velocity;
                *p_velocity_half = state.velocity_half;
            },
        );

        self.pcounters.end("integrate");
    }
}

/// Consumer of the particle state, e.g. a renderer. The system is handed in explicitly
/// after every completed step.
pub trait SimulationObserver {
    /// Returning `Ok(false)` stops the simulation.
    fn observe(&mut self, particle_system: &ParticleSystem) -> Result<bool, String>;
}

/**
 * Runs up to `num_steps` updates and hands the system to `observer` after each of them.
 * Initializes the system first if that has not happened yet. Returns the number of steps
 * that were simulated.
 */
pub fn simulate(
    particle_system: &mut ParticleSystem,
    num_steps: usize,
    dt: FT,
    observer: &mut impl SimulationObserver,
) -> Result<usize, String> {
    if !particle_system.is_initialized() {
        particle_system.initialize();
    }

    for step in 0..num_steps {
        particle_system.update(dt);
        if !observer.observe(particle_system)? {
            debug!("observer stopped the simulation after {} steps", step + 1);
            return Ok(step + 1);
        }
    }

    Ok(num_steps)
}

pub fn write_statistics(particle_system: &ParticleSystem) -> String {
    let mut s = String::new();

    let _ = writeln!(
        s,
        "simulated {} steps ({} particles, t={})",
        particle_system.step_number(),
        particle_system.num_particles(),
        particle_system.time()
    );

    if let Some(step_counter) = particle_system.pcounters.counters.get("simulation-step") {
        let _ = writeln!(s, "simulation-time: {}ms", step_counter.sum().as_secs_f64() * 1000.);
    }
    let _ = writeln!(s);

    let mut v = particle_system.pcounters.counters.iter().collect::<Vec<_>>();
    v.sort_by(|x, y| x.0.cmp(y.0));
    for (label, pcounter) in v {
        if !pcounter.values.is_empty() {
            let _ = writeln!(s, "{}: avg:{}ms", label, pcounter.avg().as_secs_f64() * 1000.);
        }
    }

    s
}

pub fn is_ft_approx_eq<FT: Float>(a: FT, b: FT, tolerance: FT) -> bool {
    assert!(!a.is_nan());
    assert!(!b.is_nan());
    b <= a + tolerance && b >= a - tolerance
}

pub fn assert_ft_approx_eq<FT: Float + Display>(a: FT, b: FT, tolerance: FT, s: impl FnOnce() -> String) {
    if !is_ft_approx_eq(a, b, tolerance) {
        panic!(
            "{} value not equal with a tolerance of {}:\n\ta={}\n\tb={}\n",
            s(),
            tolerance,
            a,
            b
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation_parameters::{InitBoundaryHandlerType, NeighborhoodSearchAlgorithm, INIT_REST_DENSITY};
    use crate::vec3f;

    fn water(mass: FT, position: V3, velocity: V3) -> Particle {
        Particle::new(mass, 0., 3., 998., 998., 0.1, position, velocity)
    }

    fn block_system(simulation_params: SimulationParams) -> ParticleSystem {
        let mut particle_system = ParticleSystem::with_params(vec3f(0., -9.81, 0.), simulation_params);
        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    let position = vec3f(3. + 0.45 * x as FT, 0.5 + 0.45 * y as FT, 3. + 0.45 * z as FT);
                    let velocity = vec3f(0.3 * (x as FT - 1.5), 0., -0.2 * (z as FT - 1.5));
                    particle_system.add_particle(water(1., position, velocity));
                }
            }
        }
        particle_system
    }

    #[test]
    fn isolated_particle_has_rest_density() {
        let mut particle_system = ParticleSystem::new(vec3f(0., -9.81, 0.));
        particle_system.add_particle(water(1., vec3f(5., 5., 5.), V3::zeros()));
        particle_system.initialize();

        let p = particle_system.particle(0);
        assert_eq!(p.density(), INIT_REST_DENSITY);
        assert_eq!(p.pressure(), 0.);
        assert_eq!(p.acceleration(), vec3f(0., -9.81, 0.));
    }

    #[test]
    fn neighbors_raise_density() {
        let mut particle_system = ParticleSystem::new(V3::zeros());
        particle_system.add_particle(water(1., vec3f(5., 5., 5.), V3::zeros()));
        particle_system.add_particle(water(2., vec3f(6., 5., 5.), V3::zeros()));
        particle_system.initialize();

        let h: FT = 5.;
        let weight = poly6(vec3f(1., 0., 0.), h);
        assert_ft_approx_eq(particle_system.particle(0).density(), 998. + 2. * weight, 1e-4, || {
            format!("density of particle 0")
        });
        assert_ft_approx_eq(particle_system.particle(1).density(), 998. + weight, 1e-4, || {
            format!("density of particle 1")
        });
        assert!(particle_system.particle(0).pressure() > 0.);
        assert!(particle_system.particle(1).pressure() > 0.);
    }

    #[test]
    fn pressure_sign_follows_density() {
        let simulation_params = SimulationParams::default();
        assert!(equation_of_state(990., simulation_params) < 0.);
        assert!(equation_of_state(1010., simulation_params) > 0.);
        assert_eq!(equation_of_state(998., simulation_params), 0.);
    }

    #[test]
    fn self_interaction_is_excluded() {
        let mut particle_system = ParticleSystem::new(vec3f(0., -1., 0.));
        particle_system.add_particle(water(1., vec3f(5., 5., 5.), vec3f(1., 0., 0.)));
        particle_system.add_particle(water(1., vec3f(5.3, 5., 5.), vec3f(0., 1., 0.)));
        particle_system.add_particle(water(1., vec3f(5., 5.2, 5.1), V3::zeros()));
        particle_system.initialize();

        for p in particle_system.particles() {
            assert_vector_finite(&p.acceleration(), "acceleration");
            assert!(p.density().is_finite());
            assert!(p.pressure().is_finite());
        }

        // close particles push each other apart
        let a0 = particle_system.particle(0).acceleration();
        let a1 = particle_system.particle(1).acceleration();
        assert!(a0.x < 0.);
        assert!(a1.x > 0.);
    }

    #[test]
    fn distant_particles_at_rest_stay_at_rest() {
        for distance in [6., 3.] {
            let mut particle_system = ParticleSystem::new(V3::zeros());
            let a = vec3f(2., 5., 5.);
            let b = vec3f(2. + distance, 5., 5.);
            particle_system.add_particle(water(1., a, V3::zeros()));
            particle_system.add_particle(water(1., b, V3::zeros()));

            particle_system.initialize();
            particle_system.update(0.1);

            assert_eq!(particle_system.positions(), &[a, b]);
            assert_eq!(particle_system.velocities(), &[V3::zeros(), V3::zeros()]);
        }
    }

    #[test]
    fn boundary_reflects_but_keeps_half_step_velocity() {
        let mut particle_system = ParticleSystem::new(V3::zeros());
        particle_system.add_particle(water(1., vec3f(9.9, 5., 5.), vec3f(2., 0., 0.)));

        particle_system.initialize();
        particle_system.update(0.1);

        let p = particle_system.particle(0);
        assert_ft_approx_eq(p.position().x, 9.9, 1e-5, || format!("reflected x"));
        assert_eq!(p.velocity(), vec3f(-2., 0., 0.));
        assert_eq!(p.velocity_half(), vec3f(2., 0., 0.));
    }

    #[test]
    fn without_boundary_particles_leave_the_box() {
        let simulation_params = SimulationParams {
            init_boundary_handler: InitBoundaryHandlerType::NoBoundary,
            ..SimulationParams::default()
        };
        let mut particle_system = ParticleSystem::with_params(V3::zeros(), simulation_params);
        particle_system.add_particle(water(1., vec3f(9.9, 5., 5.), vec3f(2., 0., 0.)));

        particle_system.initialize();
        particle_system.update(0.1);

        assert_ft_approx_eq(particle_system.particle(0).position().x, 10.1, 1e-5, || format!("x"));
        assert_eq!(particle_system.particle(0).velocity(), vec3f(2., 0., 0.));
    }

    #[test]
    fn free_fall_matches_analytic_solution() {
        let mut particle_system = ParticleSystem::new(vec3f(0., -1., 0.));
        particle_system.add_particle(water(3., vec3f(5., 9., 5.), V3::zeros()));
        particle_system.initialize();

        let dt = particle_system.params().time_step;
        for _ in 0..10 {
            particle_system.update(dt);
        }

        // x(t) = x0 - t^2 / 2 after t = 1
        assert_ft_approx_eq(particle_system.particle(0).position().y, 8.5, 1e-4, || format!("y"));
        assert_ft_approx_eq(particle_system.time(), 1., 1e-5, || format!("time"));
        assert_eq!(particle_system.step_number(), 10);
    }

    #[test]
    fn repeated_runs_are_bit_identical() {
        let run = || {
            let mut particle_system = block_system(SimulationParams::default());
            particle_system.initialize();
            for _ in 0..8 {
                particle_system.update(0.05);
            }
            particle_system.particles().collect::<Vec<_>>()
        };

        let first = run();
        let second = run();
        assert_eq!(first, second);
    }

    #[test]
    fn neighborhood_search_algorithms_agree() {
        let run = |algorithm| {
            let simulation_params = SimulationParams {
                neighborhood_search_algorithm: algorithm,
                ..SimulationParams::default()
            };
            let mut particle_system = block_system(simulation_params);
            particle_system.initialize();
            for _ in 0..8 {
                particle_system.update(0.05);
            }
            particle_system.particles().collect::<Vec<_>>()
        };

        let reference = run(NeighborhoodSearchAlgorithm::AllPairs);
        assert_eq!(run(NeighborhoodSearchAlgorithm::Grid), reference);
        assert_eq!(run(NeighborhoodSearchAlgorithm::RStar), reference);

        for p in &reference {
            assert_vector_finite(&p.position(), "position");
        }
    }

    #[test]
    fn far_away_particles_do_not_break_grid_search() {
        for init_boundary_handler in [InitBoundaryHandlerType::Box, InitBoundaryHandlerType::NoBoundary] {
            let run = |algorithm| {
                let simulation_params = SimulationParams {
                    neighborhood_search_algorithm: algorithm,
                    init_boundary_handler,
                    ..SimulationParams::default()
                };
                let mut particle_system = ParticleSystem::with_params(V3::zeros(), simulation_params);
                particle_system.add_particle(water(1., vec3f(5., 5., 5.), vec3f(1.0e12, 0., 0.)));
                particle_system.add_particle(water(1., vec3f(5., 5., 8.), V3::zeros()));
                particle_system.initialize();
                particle_system.update(0.1);
                particle_system.update(0.1);
                particle_system.particles().collect::<Vec<_>>()
            };

            let reference = run(NeighborhoodSearchAlgorithm::AllPairs);
            assert_eq!(run(NeighborhoodSearchAlgorithm::Grid), reference);
            assert_eq!(run(NeighborhoodSearchAlgorithm::RStar), reference);
            assert_eq!(reference[1].position(), vec3f(5., 5., 8.));
        }
    }

    struct StopAfter {
        calls: usize,
        max_calls: usize,
    }

    impl SimulationObserver for StopAfter {
        fn observe(&mut self, particle_system: &ParticleSystem) -> Result<bool, String> {
            self.calls += 1;
            assert_eq!(particle_system.step_number(), self.calls);
            Ok(self.calls < self.max_calls)
        }
    }

    #[test]
    fn observer_can_stop_simulation() {
        let mut particle_system = block_system(SimulationParams::default());
        let mut observer = StopAfter { calls: 0, max_calls: 3 };

        let steps = simulate(&mut particle_system, 10, 0.01, &mut observer).unwrap();

        assert!(particle_system.is_initialized());
        assert_eq!(steps, 3);
        assert_eq!(observer.calls, 3);
    }

    #[test]
    fn statistics_list_stages() {
        let mut particle_system = block_system(SimulationParams::default());
        particle_system.set_counters_enabled(true);
        particle_system.initialize();
        particle_system.update(0.01);

        let s = write_statistics(&particle_system);
        for label in ["density", "forces", "integrate", "neighborhood", "pressure", "simulation-step"] {
            assert!(s.contains(label), "missing {} in {}", label, s);
        }
    }
}
