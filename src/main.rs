//! # SatNet DTN Simulator - Main Entry Point
//!
//! A store-carry-forward simulation engine for satellite and ground-station
//! delay-tolerant networks. Given nodes with time-parameterised positions, a
//! flat PHY profile, and a bundle workload, it reproduces bundle evolution
//! under intermittent connectivity and reports per-bundle outcomes and
//! per-contact byte accounting.
//!
//! Two execution modes share the data model, buffers, and reporting:
//!
//! 1. **Geometric contact engine**: at each tick, line-of-sight and PHY
//!    range decide which node pairs are in contact, and an opportunistic
//!    routing policy (Epidemic, PRoPHET-like, Spray-and-Wait) advances
//!    bundle custody.
//! 2. **Contact-plan scheduler**: a pre-computed sequence of directed
//!    contact windows drives bundles through bounded buffers under byte
//!    budgets, TTL, minimum dwell, and duplicate suppression.
//!
//! The binary takes one argument, the scenario JSON path, and writes the
//! run report as JSON to stdout. Everything is single-threaded and
//! deterministic for a given scenario and seed.

use std::path::Path;
use std::time::Duration;

use env_logger::Builder;
use log::{LevelFilter, info};

mod buffer;
mod clock;
mod engine;
mod error;
mod geometry;
mod model;
mod phy;
mod report;
mod scenario;
mod scheduler;

use clock::StopFlag;
use engine::driver::GeometricEngine;
use error::SimError;
use model::contact::JsonPlanFile;
use report::EventLog;
use scenario::{RunMode, Scenario, build_world, load_scenario};
use scheduler::run::PlanScheduler;

fn main() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("satnet_dtn_simulator"), LevelFilter::Debug)
        .init();

    info!("Starting up");

    let Some(scenario_path) = std::env::args().nth(1) else {
        log::error!("usage: satnet-dtn-simulator <scenario.json>");
        std::process::exit(2);
    };

    if let Err(err) = run(Path::new(&scenario_path)) {
        log::error!("run aborted: {err}");
        std::process::exit(1);
    }
}

fn run(scenario_path: &Path) -> Result<(), SimError> {
    let scenario = load_scenario(scenario_path)?;
    let report_json = match scenario.mode {
        RunMode::Geometric => run_geometric(&scenario)?,
        RunMode::ContactPlan => run_contact_plan(&scenario, scenario_path)?,
    };
    println!("{report_json}");
    Ok(())
}

/// Stop flag for the run, armed with a wall-clock watchdog when the
/// `SATNET_WALL_CLOCK_BUDGET_SECS` environment variable is set. The
/// watchdog thread only ever touches the flag; the simulation itself
/// stays single-threaded and polls it at its atomic boundaries.
fn wall_clock_stop_flag() -> StopFlag {
    let stop = StopFlag::new();
    if let Ok(budget) = std::env::var("SATNET_WALL_CLOCK_BUDGET_SECS") {
        match budget.parse::<u64>() {
            Ok(secs) if secs > 0 => {
                let handle = stop.clone();
                std::thread::spawn(move || {
                    std::thread::sleep(Duration::from_secs(secs));
                    log::warn!("wall-clock budget of {secs} s exhausted, requesting stop");
                    handle.request_stop();
                });
            }
            _ => log::warn!("ignoring unparsable SATNET_WALL_CLOCK_BUDGET_SECS={budget}"),
        }
    }
    stop
}

/// Event log, optionally streamed line-by-line to the file named by
/// `SATNET_EVENT_LOG`. Sink failures are swallowed by the log itself.
fn event_log_from_env() -> EventLog {
    let Ok(path) = std::env::var("SATNET_EVENT_LOG") else {
        return EventLog::new();
    };
    match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(mut file) => EventLog::with_sink(Box::new(move |line| {
            use std::io::Write;
            writeln!(file, "{line}")?;
            Ok(())
        })),
        Err(err) => {
            log::warn!("cannot open event log file '{path}': {err}");
            EventLog::new()
        }
    }
}

fn run_geometric(scenario: &Scenario) -> Result<String, SimError> {
    let (nodes, oracle) = build_world(scenario)?;
    let resolved = scenario.geometric_config()?.resolve(&nodes)?;
    let mut log = event_log_from_env();
    let report = GeometricEngine::new(&nodes, &oracle, resolved)
        .with_stop_flag(wall_clock_stop_flag())
        .run(&mut log)?;
    info!("{} events recorded", log.lines().len());
    Ok(serde_json::to_string_pretty(&report)?)
}

fn run_contact_plan(scenario: &Scenario, scenario_path: &Path) -> Result<String, SimError> {
    let config = scenario.plan_config()?;
    let resolved = config.resolve()?;
    let plan_path = config.contact_plan_source.as_deref().ok_or_else(|| {
        SimError::config("contact-plan mode requires 'contact_plan_source' in the scenario")
    })?;

    // Plan paths are relative to the scenario file's directory.
    let plan_path = match scenario_path.parent() {
        Some(dir) => dir.join(plan_path),
        None => Path::new(plan_path).to_path_buf(),
    };
    let source = JsonPlanFile::load(&plan_path)?;

    let mut log = event_log_from_env();
    let report = PlanScheduler::new(resolved, &source)
        .with_stop_flag(wall_clock_stop_flag())
        .run(&mut log)?;
    info!("{} events recorded", log.lines().len());
    Ok(serde_json::to_string_pretty(&report)?)
}
