use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    floating_type_mod::FT,
    simulation_parameters::{SimulationParams, INIT_EOS_STIFFNESS, INIT_REST_DENSITY},
    vec3f, Particle, ParticleSystem, V3,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed reading config file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("not able to find attribute `{0}` in simulation parameters")]
    UnknownAttribute(String),
    #[error("simulation parameters are not a mapping")]
    NotAMapping,
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_attribute_map(yaml: &str) -> Result<HashMap<String, serde_yaml::Value>, ConfigError> {
    if yaml.trim().is_empty() {
        return Ok(HashMap::new());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

/**
 * Parses simulation parameters. Attributes missing in `yaml` keep their default value,
 * every document in `overwrites` then replaces single attributes. Unknown attribute names
 * are rejected instead of being ignored silently.
 */
pub fn parse_simulation_params(yaml: &str, overwrites: &[&str]) -> Result<SimulationParams, ConfigError> {
    let mut simulation_params_serde = serde_yaml::to_value(SimulationParams::default())?;
    let mapping = simulation_params_serde
        .as_mapping_mut()
        .ok_or(ConfigError::NotAMapping)?;

    for document in std::iter::once(yaml).chain(overwrites.iter().cloned()) {
        for (k, v) in parse_attribute_map(document)? {
            *mapping
                .get_mut(&serde_yaml::Value::String(k.clone()))
                .ok_or(ConfigError::UnknownAttribute(k))? = v;
        }
    }

    Ok(serde_yaml::from_value(simulation_params_serde)?)
}

pub fn load_simulation_params(path: &Path, overwrite_path: Option<&Path>) -> Result<SimulationParams, ConfigError> {
    let params_yaml = read_file(path)?;
    let overwrite_yaml = match overwrite_path {
        Some(overwrite_path) => Some(read_file(overwrite_path)?),
        None => None,
    };
    let overwrites: Vec<&str> = overwrite_yaml.iter().map(|s| s.as_str()).collect();

    parse_simulation_params(&params_yaml, &overwrites)
}

fn default_mass() -> FT {
    1.
}

fn default_stiffness() -> FT {
    INIT_EOS_STIFFNESS
}

fn default_rest_density() -> FT {
    INIT_REST_DENSITY
}

fn default_viscosity() -> FT {
    0.1
}

/// Axis-aligned block of fluid sampled on a regular grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneFluidBlock {
    pub pos: [FT; 3],
    pub size: [FT; 3],
    pub spacing: FT,
    #[serde(default)]
    pub velocity: [FT; 3],
    #[serde(default = "default_mass")]
    pub mass: FT,
    #[serde(default = "default_stiffness")]
    pub stiffness: FT,
    #[serde(default = "default_rest_density")]
    pub rest_density: FT,
    #[serde(default = "default_viscosity")]
    pub viscosity: FT,

    // random offset in units of `spacing`
    #[serde(default)]
    pub jitter: FT,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    pub gravity: V3,
    #[serde(default)]
    pub seed: u64,
    pub blocks: Vec<SceneFluidBlock>,
}

pub fn parse_scene_config(yaml: &str) -> Result<SceneConfig, ConfigError> {
    Ok(serde_yaml::from_str(yaml)?)
}

pub fn load_scene_config(path: &Path) -> Result<SceneConfig, ConfigError> {
    parse_scene_config(&read_file(path)?)
}

fn add_fluid_block(block: &SceneFluidBlock, rng: &mut StdRng, particles: &mut Vec<Particle>) {
    let counts: Vec<usize> = (0..3)
        .map(|d| (block.size[d] / block.spacing).floor().max(0.) as usize)
        .collect();
    let velocity = vec3f(block.velocity[0], block.velocity[1], block.velocity[2]);

    for z in 0..counts[2] {
        for y in 0..counts[1] {
            for x in 0..counts[0] {
                let mut position = vec3f(
                    block.pos[0] + (x as FT + 0.5) * block.spacing,
                    block.pos[1] + (y as FT + 0.5) * block.spacing,
                    block.pos[2] + (z as FT + 0.5) * block.spacing,
                );
                if block.jitter > 0. {
                    for d in 0..3 {
                        position[d] += rng.gen_range(-1.0..1.0) * block.jitter * block.spacing;
                    }
                }

                particles.push(Particle::new(
                    block.mass,
                    0.,
                    block.stiffness,
                    block.rest_density,
                    block.rest_density,
                    block.viscosity,
                    position,
                    velocity,
                ));
            }
        }
    }
}

/// Builds an uninitialized particle system with all fluid blocks of the scene.
pub fn init_particle_system(simulation_params: SimulationParams, scene_config: &SceneConfig) -> ParticleSystem {
    let mut rng = StdRng::seed_from_u64(scene_config.seed);

    let mut particles = Vec::new();
    for block in &scene_config.blocks {
        add_fluid_block(block, &mut rng, &mut particles);
    }

    info!("init {} fluid particles", particles.len());

    let mut particle_system = ParticleSystem::with_params(scene_config.gravity, simulation_params);
    for particle in particles {
        particle_system.add_particle(particle);
    }
    particle_system
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation_parameters::NeighborhoodSearchAlgorithm;

    const SCENE: &str = "
gravity: [0.0, -9.81, 0.0]
seed: 3
blocks:
  - pos: [1.0, 1.0, 1.0]
    size: [2.0, 1.0, 1.5]
    spacing: 0.5
    velocity: [0.5, 0.0, 0.0]
  - pos: [6.0, 6.0, 6.0]
    size: [1.0, 1.0, 1.0]
    spacing: 0.5
    mass: 2.0
    jitter: 0.1
";

    #[test]
    fn overwrites_replace_attributes() {
        let simulation_params = parse_simulation_params(
            "eos_stiffness: 5.0\nboundary_max: 20.0\n",
            &["eos_stiffness: 9.0\nneighborhood_search_algorithm: RStar\n"],
        )
        .unwrap();

        assert_eq!(simulation_params.eos_stiffness, 9.);
        assert_eq!(simulation_params.boundary_max, 20.);
        assert_eq!(simulation_params.neighborhood_search_algorithm, NeighborhoodSearchAlgorithm::RStar);
        assert_eq!(simulation_params.rest_density, INIT_REST_DENSITY);
    }

    #[test]
    fn empty_config_gives_defaults() {
        assert_eq!(parse_simulation_params("", &[]).unwrap(), SimulationParams::default());
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        match parse_simulation_params("stifness: 5.0\n", &[]) {
            Err(ConfigError::UnknownAttribute(k)) => assert_eq!(k, "stifness"),
            other => panic!("expected unknown attribute error, got {:?}", other),
        }
    }

    #[test]
    fn non_mapping_config_is_rejected() {
        assert!(matches!(
            parse_simulation_params("- 1.0\n- 2.0\n", &[]),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            parse_simulation_params("", &["eos_stiffness"]),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_scene_config(Path::new("/nonexistent/scene.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/scene.yaml"));
    }

    #[test]
    fn scene_blocks_are_sampled_on_grid() {
        let scene_config = parse_scene_config(SCENE).unwrap();
        let particle_system = init_particle_system(SimulationParams::default(), &scene_config);

        // 4 * 2 * 3 + 2 * 2 * 2
        assert_eq!(particle_system.num_particles(), 32);
        assert_eq!(particle_system.gravity(), vec3f(0., -9.81, 0.));

        let first = particle_system.particle(0);
        assert_eq!(first.position(), vec3f(1.25, 1.25, 1.25));
        assert_eq!(first.velocity(), vec3f(0.5, 0., 0.));
        assert_eq!(first.mass(), 1.);
        assert_eq!(first.rest_density(), INIT_REST_DENSITY);

        let last = particle_system.particle(31);
        assert_eq!(last.mass(), 2.);
        assert!((last.position() - vec3f(6.75, 6.75, 6.75)).amax() <= 0.05 + 1e-5);
    }

    #[test]
    fn jitter_is_reproducible() {
        let scene_config = parse_scene_config(SCENE).unwrap();
        let a = init_particle_system(SimulationParams::default(), &scene_config);
        let b = init_particle_system(SimulationParams::default(), &scene_config);
        assert_eq!(a.positions(), b.positions());
    }
}
