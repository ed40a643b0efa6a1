use std::fmt::{self, Display};

use nalgebra::zero;

use crate::{floating_type_mod::FT, v3_str, V3};

/// A single fluid sample as handed to and read back from the simulation.
///
/// The system itself stores particles column-wise in [`ParticleVec`]; this type is only the
/// row view used for construction and snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    mass: FT,
    pressure: FT,
    stiffness: FT,
    rest_density: FT,
    density: FT,
    viscosity: FT,
    position: V3,
    velocity: V3,

    // velocity at t - dt/2, the persistent state of the leapfrog scheme
    velocity_half: V3,

    // force / mass, recomputed every step
    acceleration: V3,
}

impl Default for Particle {
    fn default() -> Self {
        Particle {
            mass: 1.,
            pressure: 0.,
            stiffness: 0.,
            rest_density: 0.,
            density: 0.,
            viscosity: 0.,
            position: zero(),
            velocity: zero(),
            velocity_half: zero(),
            acceleration: zero(),
        }
    }
}

impl Particle {
    pub fn new(
        mass: FT,
        pressure: FT,
        stiffness: FT,
        rest_density: FT,
        density: FT,
        viscosity: FT,
        position: V3,
        velocity: V3,
    ) -> Self {
        Particle {
            mass,
            pressure,
            stiffness,
            rest_density,
            density,
            viscosity,
            position,
            velocity,
            ..Self::default()
        }
    }

    pub fn mass(&self) -> FT {
        self.mass
    }

    /** volume = mass / density */
    pub fn volume(&self) -> FT {
        self.mass / self.density
    }

    pub fn pressure(&self) -> FT {
        self.pressure
    }

    pub fn stiffness(&self) -> FT {
        self.stiffness
    }

    pub fn rest_density(&self) -> FT {
        self.rest_density
    }

    pub fn density(&self) -> FT {
        self.density
    }

    pub fn viscosity(&self) -> FT {
        self.viscosity
    }

    pub fn position(&self) -> V3 {
        self.position
    }

    pub fn velocity(&self) -> V3 {
        self.velocity
    }

    pub fn velocity_half(&self) -> V3 {
        self.velocity_half
    }

    pub fn acceleration(&self) -> V3 {
        self.acceleration
    }
}

impl Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "mass: {} density: {} volume: {} pressure: {}",
            self.mass,
            self.density,
            self.volume(),
            self.pressure
        )?;
        writeln!(
            f,
            "stiffness: {} rest density: {} viscosity: {}",
            self.stiffness, self.rest_density, self.viscosity
        )?;
        writeln!(f, "position: {}", v3_str(&self.position))?;
        writeln!(f, "velocity: {}", v3_str(&self.velocity))?;
        writeln!(f, "velocity half: {}", v3_str(&self.velocity_half))?;
        write!(f, "acceleration: {}", v3_str(&self.acceleration))
    }
}

macro_rules! decl_particle_vec {
    (pub struct $struct_name:ident { $(pub $field_name:ident: Vec<$field_type:ty> | $getter:ident),*$(,)?  }) => {
        /// Column-wise particle storage, every `Vec` is indexed by the particle id.
        #[derive(Debug, Clone, Default)]
        pub struct $struct_name {
            $(
                pub $field_name : Vec<$field_type>,
            )*
        }

        impl $struct_name {
            pub fn push(&mut self, particle: Particle) {
                $(
                    self.$field_name.push(particle.$getter());
                )*
            }

            pub fn get(&self, i: usize) -> Particle {
                Particle {
                    $(
                        $field_name: self.$field_name[i],
                    )*
                }
            }
        }
    }
}

decl_particle_vec! {
    pub struct ParticleVec {
        pub mass: Vec<FT> | mass,
        pub pressure: Vec<FT> | pressure,

        // material constants, not consulted by the equation of state
        pub stiffness: Vec<FT> | stiffness,
        pub rest_density: Vec<FT> | rest_density,

        pub density: Vec<FT> | density,
        pub viscosity: Vec<FT> | viscosity,
        pub position: Vec<V3> | position,
        pub velocity: Vec<V3> | velocity,
        pub velocity_half: Vec<V3> | velocity_half,
        pub acceleration: Vec<V3> | acceleration,
    }
}

impl ParticleVec {
    pub(crate) fn len(&self) -> usize {
        self.position.len()
    }

    /** volume = mass / density */
    pub fn volume(&self, i: usize) -> FT {
        self.mass[i] / self.density[i]
    }
}

#[test]
fn particle_vec_push_and_get() {
    use crate::vec3f;

    let mut particles = ParticleVec::default();
    let a = Particle::new(1., 0., 3., 998., 998., 0.1, vec3f(1., 2., 3.), vec3f(0., -1., 0.));
    let b = Particle::new(2., 5., 3., 998., 1000., 0.1, vec3f(4., 5., 6.), zero());

    particles.push(a);
    particles.push(b);
    particles.velocity_half[1] = vec3f(0., 0., 1.);

    assert_eq!(particles.len(), 2);
    assert_eq!(particles.get(0), a);
    assert_eq!(particles.get(1).position(), vec3f(4., 5., 6.));
    assert_eq!(particles.get(1).velocity_half(), vec3f(0., 0., 1.));
    assert_eq!(particles.volume(1), 0.002);
}

#[test]
fn particle_volume_is_mass_over_density() {
    use crate::vec3f;

    let p = Particle::new(2., 0., 3., 998., 4., 0., vec3f(0., 0., 0.), vec3f(0., 0., 0.));
    assert_eq!(p.volume(), 0.5);
    assert!(p.to_string().contains("volume: 0.5"));
}
