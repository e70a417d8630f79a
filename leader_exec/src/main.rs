//! Main leader executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Create the board and the network channels
//!     - Main loop, one cycle per cycle period:
//!         - Setpoint processing and speed estimation
//!         - Drive actuation and odometry update, each control period
//!         - Vehicle data reporting, each reporting period
//!         - System state machine processing
//!         - Saving of finished lap records
//!
//! The executable ends once all lap attempts have been driven.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use std::{
    thread,
    time::{Duration, Instant},
};
use structopt::StructOpt;

// Internal
use comms_if::net::zmq;
use leader_lib::{
    app::{App, SetpointSource, VehicleDataSink},
    params::LeaderExecParams,
    setpoint_client::SetpointClient,
    sim::{Sim, SimParams},
    tm_server::TmServer,
};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Convoy leader executable
#[derive(Debug, StructOpt)]
#[structopt(name = "leader_exec")]
struct Opts {
    /// Parameter file of the executable, relative to the params directory
    #[structopt(long, default_value = "leader_exec.toml")]
    params: String,

    /// Parameter file of the simulation, relative to the params directory
    #[structopt(long, default_value = "sim.toml")]
    sim_params: String,

    /// Run the cycles in real time rather than as fast as possible
    #[structopt(long)]
    realtime: bool,

    /// Log every cycle's steering output
    #[structopt(long)]
    trace: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    let opts = Opts::from_args();

    // Initialise session
    let session = Session::new(
        "leader_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = match opts.trace {
        true => LevelFilter::Trace,
        false => LevelFilter::Debug
    };
    logger_init(level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Convoy Leader Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: LeaderExecParams = util::params::load(&opts.params)
        .wrap_err("Could not load exec params")?;
    params.validate()
        .wrap_err("Invalid exec params")?;

    let sim_params: SimParams = util::params::load(&opts.sim_params)
        .wrap_err("Could not load sim params")?;

    info!("Parameters loaded");

    // ---- INITIALISE NETWORK ----

    let zmq_ctx = zmq::Context::new();

    let mut tm_server: Option<Box<dyn VehicleDataSink>> = None;
    let mut setpoint_client: Option<Box<dyn SetpointSource>> = None;

    match params.net {
        Some(ref net_params) => {
            // Without the channels the leader still drives, it just can't be observed or
            // overridden.
            match TmServer::new(&zmq_ctx, net_params) {
                Ok(s) => {
                    info!("TmServer initialised on {}", net_params.tm_endpoint);
                    tm_server = Some(Box::new(s));
                },
                Err(e) => warn!("Could not initialise the TmServer: {}", e)
            }

            match SetpointClient::new(&zmq_ctx, net_params) {
                Ok(c) => {
                    info!("SetpointClient initialised on {}", net_params.setpoint_endpoint);
                    setpoint_client = Some(Box::new(c));
                },
                Err(e) => warn!("Could not initialise the SetpointClient: {}", e)
            }
        },
        None => info!("No network parameters, running without network channels")
    }

    // ---- INITIALISE APP ----

    let sim = Sim::new(sim_params);
    let cycle_period_ms = params.cycle_period_ms;

    let mut app = App::new(sim.board(), params, tm_server, setpoint_client);
    app.setup();

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    while !app.is_done() {

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        app.cycle();

        for lap in app.new_laps() {
            session.save(format!("laps/lap_{}.json", lap.attempt), lap);
        }

        sim.advance(cycle_period_ms);

        // ---- CYCLE MANAGEMENT ----

        if opts.realtime {
            let cycle_dur = Instant::now() - cycle_start_instant;

            if let Some(d) = Duration::from_millis(cycle_period_ms).checked_sub(cycle_dur) {
                thread::sleep(d);
            }
        }
    }

    // ---- SHUTDOWN ----

    for lap in app.laps() {
        match lap.result.lap_time_ms() {
            Some(t) => info!("Attempt {} ({}): {} ms", lap.attempt, lap.parameter_set, t),
            None => info!("Attempt {} ({}): {:?}", lap.attempt, lap.parameter_set, lap.result)
        }
    }

    session.exit();

    info!("End of execution");

    Ok(())
}
