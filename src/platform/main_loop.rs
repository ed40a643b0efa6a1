use std::{io::Write, path::Path};

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use log::{error, info, LevelFilter};

use leapfrog_sph::{
    floating_type_mod::FT, init_particle_system, load_scene_config,
    load_simulation_params, simulate, simulation_parameters::SimulationParams, v3_str, write_statistics,
    ParticleSystem, SimulationObserver,
};

const CARGO_PKG_AUTHORS: &'static str = env!("CARGO_PKG_AUTHORS");
const CARGO_PKG_VERSION: &'static str = env!("CARGO_PKG_VERSION");
const CARGO_PKG_DESCRIPTION: &'static str = env!("CARGO_PKG_DESCRIPTION");

pub fn start() {
    let matches = App::new("Leapfrog SPH Simulation")
        .version(CARGO_PKG_VERSION)
        .author(CARGO_PKG_AUTHORS)
        .about(CARGO_PKG_DESCRIPTION)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("Run simulation with given config")
                .arg(
                    Arg::with_name("SIMULATION_CONFIG")
                        .help("Sets the simulation paramaters")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("SCENE_CONFIG")
                        .help("Scene setup")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::with_name("STEPS")
                        .long("steps")
                        .short("n")
                        .takes_value(true)
                        .default_value("100")
                        .help("Number of simulation steps"),
                )
                .arg(
                    Arg::with_name("DT")
                        .long("dt")
                        .takes_value(true)
                        .help("Time step of each update (defaults to `time_step` of the simulation config)"),
                )
                .arg(
                    Arg::with_name("OVERWRITE_CONFIG_FILE")
                        .long("overwrite-config-file")
                        .short("c")
                        .required(false)
                        .takes_value(true)
                        .help("Overwrite config"),
                )
                .arg(
                    Arg::with_name("PRINT_EVERY")
                        .long("print-every")
                        .short("k")
                        .takes_value(true)
                        .default_value("1")
                        .help("Print particle positions every K steps (0 disables printing)"),
                )
                .arg(
                    Arg::with_name("STATISTICS_ENABLED")
                        .help("Track performance of individual steps")
                        .short("p")
                        .long("statistics-enabled")
                        .takes_value(false),
                ),
        )
        .subcommand(SubCommand::with_name("default-config").about("Print the default simulation parameters as YAML"))
        .get_matches();

    let level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    let result = if let Some(run_matches) = matches.subcommand_matches("run") {
        run(run_matches)
    } else if matches.subcommand_matches("default-config").is_some() {
        serde_yaml::to_string(&SimulationParams::default())
            .map(|s| print!("{}", s))
            .map_err(|e| e.to_string())
    } else {
        unreachable!()
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn parse_arg<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    matches
        .value_of(name)
        .map(|s| s.parse::<T>().map_err(|e| format!("invalid value `{}` for {}: {}", s, name, e)))
        .transpose()
}

fn run(run_matches: &ArgMatches) -> Result<(), String> {
    let parameter_file = run_matches.value_of("SIMULATION_CONFIG").ok_or("missing simulation config")?;
    let simulation_params = load_simulation_params(
        Path::new(parameter_file),
        run_matches.value_of("OVERWRITE_CONFIG_FILE").map(Path::new),
    )
    .map_err(|e| e.to_string())?;
    info!("{:?}", simulation_params);

    let scene_file_path = run_matches.value_of("SCENE_CONFIG").ok_or("missing scene config")?;
    let scene_config = load_scene_config(Path::new(scene_file_path)).map_err(|e| e.to_string())?;
    info!("{:?}", scene_config);

    let num_steps: usize = parse_arg(run_matches, "STEPS")?.unwrap_or(100);
    let dt: FT = parse_arg(run_matches, "DT")?.unwrap_or(simulation_params.time_step);
    let print_every: usize = parse_arg(run_matches, "PRINT_EVERY")?.unwrap_or(1);
    let counters_enabled = run_matches.is_present("STATISTICS_ENABLED");

    let mut particle_system = init_particle_system(simulation_params, &scene_config);
    particle_system.set_counters_enabled(counters_enabled);

    if let Some(max) = particle_system.boundary_handler().max() {
        info!("box boundary [0, {}]^3", max);
    }

    let mut printer = PositionPrinter {
        print_every,
        out: std::io::stdout(),
    };
    if print_every > 0 {
        printer.print(&particle_system)?;
    }

    let steps = simulate(&mut particle_system, num_steps, dt, &mut printer)?;
    info!("finished {} steps at t={}", steps, particle_system.time());

    if counters_enabled {
        print!("{}", write_statistics(&particle_system));
    }

    Ok(())
}

/// Writes one line per particle position after every `print_every`-th step.
struct PositionPrinter<W: Write> {
    print_every: usize,
    out: W,
}

impl<W: Write> PositionPrinter<W> {
    fn print(&mut self, particle_system: &ParticleSystem) -> Result<(), String> {
        let io_err = |e: std::io::Error| e.to_string();

        writeln!(self.out, "step {} t={}", particle_system.step_number(), particle_system.time()).map_err(io_err)?;
        for (i, position) in particle_system.positions().iter().enumerate() {
            writeln!(self.out, "{} {}", i, v3_str(position)).map_err(io_err)?;
        }
        Ok(())
    }
}

impl<W: Write> SimulationObserver for PositionPrinter<W> {
    fn observe(&mut self, particle_system: &ParticleSystem) -> Result<bool, String> {
        if self.print_every > 0 && particle_system.step_number() % self.print_every == 0 {
            self.print(particle_system)?;
        }
        Ok(true)
    }
}
