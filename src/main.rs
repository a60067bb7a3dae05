//! The graphite-proxy binary: loads the configuration, wires the client,
//! buffers, pipeline, router, periodic workers and listeners together, then
//! serves signals until told to terminate.

extern crate chan_signal;
extern crate chrono;
extern crate fern;
extern crate graphite_proxy;

#[macro_use]
extern crate log;

use chan_signal::Signal;
use chrono::Utc;
use graphite_proxy::buffer::GlobalBuffer;
use graphite_proxy::client;
use graphite_proxy::client::Client;
use graphite_proxy::config;
use graphite_proxy::constants;
use graphite_proxy::flusher::Flusher;
use graphite_proxy::maths;
use graphite_proxy::maths::Pipeline;
use graphite_proxy::reaper::Reaper;
use graphite_proxy::router::Router;
use graphite_proxy::source::{Tcp, Udp};
use graphite_proxy::state::CurrentState;
use graphite_proxy::stats;
use graphite_proxy::task::Runner;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;

fn init_logging(args: &config::Args) -> Result<(), fern::InitError> {
    let level = match args.logs_level.as_str() {
        "quiet" => log::LevelFilter::Off,
        "error" => log::LevelFilter::Error,
        "warning" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut dispatch = fern::Dispatch::new().level(level);

    if args.logs_colors {
        let colors = fern::colors::ColoredLevelConfig::new()
            .error(fern::colors::Color::Red)
            .warn(fern::colors::Color::Yellow)
            .info(fern::colors::Color::Green)
            .debug(fern::colors::Color::Cyan)
            .trace(fern::colors::Color::Magenta);
        dispatch = dispatch.format(move |out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                record.target(),
                Utc::now().to_rfc3339(),
                colors.color(record.level()),
                message
            ))
        });
    } else {
        dispatch = dispatch.format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                record.target(),
                Utc::now().to_rfc3339(),
                record.level(),
                message
            ))
        });
    }

    dispatch = match args.logs_destination.as_str() {
        "stdout" => dispatch.chain(std::io::stdout()),
        "stderr" => dispatch.chain(std::io::stderr()),
        path => dispatch.chain(fern::log_file(path)?),
    };

    dispatch.apply()?;
    Ok(())
}

/// Everything the termination path needs to own.
struct Shutdown {
    runners: Vec<Runner>,
    router: Arc<Router>,
    save: bool,
    pass_through_path: PathBuf,
    maths_path: PathBuf,
}

impl Shutdown {
    fn execute(mut self) {
        for runner in &mut self.runners {
            runner.stop();
        }
        if self.save {
            let saved = self
                .router
                .serialize_pending(&self.pass_through_path, &self.maths_path);
            info!("{} pending messages saved", saved);
        }
    }
}

fn main() {
    let args = match config::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(constants::EXIT_BAD_CONFIGURATION);
        }
    };

    // signals must be claimed before any other thread starts
    let signal = chan_signal::notify(&[
        Signal::INT,
        Signal::TERM,
        Signal::QUIT,
        Signal::USR1,
        Signal::USR2,
    ]);

    if let Err(e) = init_logging(&args) {
        eprintln!("could not set up logging: {}", e);
        process::exit(constants::EXIT_BAD_CONFIGURATION);
    }

    info!(
        "graphite-proxy - {} (PID {})",
        env!("CARGO_PKG_VERSION"),
        process::id()
    );

    let registry = Arc::new(stats::Registry::new());

    // client
    let client: Arc<dyn Client> =
        match client::Graphite::new(&args.client_address, args.client_port, registry.clone()) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                error!("client misconfiguration: {}", e);
                process::exit(constants::EXIT_BAD_CONFIGURATION);
            }
        };

    // global buffer
    let global = Arc::new(GlobalBuffer::new(
        args.buffer_flush_size,
        args.buffer_drop_oldest,
        client.clone(),
    ));

    // aggregation pipeline
    let pipeline = if args.maths_enabled {
        let pipeline = Arc::new(Pipeline::new(
            &args.maths_path(),
            global.clone(),
            args.maths_size,
            registry.clone(),
        ));
        if !pipeline.is_valid() {
            error!("bad configuration initialization, aborting");
            process::exit(constants::EXIT_BAD_CONFIGURATION);
        }
        Some(pipeline)
    } else {
        info!("aggregation module disabled");
        None
    };

    // router
    let router = Arc::new(Router::new(
        global.clone(),
        pipeline.clone(),
        registry.clone(),
    ));

    // periodic workers
    let mut runners = Vec::new();

    let mut flusher = Runner::new(args.buffer_flush_time);
    flusher.start(Flusher::new(global.clone(), client.clone()));
    info!(
        "flushing pass through messages every {} seconds",
        flusher.period()
    );
    runners.push(flusher);

    if let Some(ref pipeline) = pipeline {
        let mut runner = Runner::new(args.maths_time);
        runner.start(maths::Ticker::new(pipeline.clone()));
        runners.push(runner);
    }

    if args.cleaning_activated {
        let mut runner = Runner::new(args.cleaning_time);
        runner.start(Reaper::new(
            global.clone(),
            pipeline.clone(),
            args.cleaning_max_empty_time,
        ));
        runners.push(runner);
    } else {
        info!("reaper module disabled");
    }

    if args.stats_enabled {
        let mut runner = Runner::new(args.stats_time);
        runner.start(stats::Collector::new(
            registry.clone(),
            global.clone(),
            pipeline.clone(),
            router.clone(),
        ));
        runners.push(runner);
    } else {
        info!("statistics module disabled");
    }

    // reload whatever the previous run left behind
    if args.router_save {
        let loaded = router.load_pending(&args.pass_through_save_path(), &args.maths_save_path());
        info!("{} pending messages reloaded", loaded);
    }

    // listeners
    let tcp = match Tcp::bind(
        &args.server_address,
        args.server_port,
        router.clone(),
        registry.clone(),
    ) {
        Ok(tcp) => tcp,
        Err(e) => {
            error!(
                "server can't bind {}:{}: {}",
                args.server_address, args.server_port, e
            );
            process::exit(constants::EXIT_BAD_CONFIGURATION);
        }
    };
    thread::spawn(move || tcp.run());

    let udp = match Udp::bind(&args.server_address, args.server_udp_port, router.clone()) {
        Ok(udp) => udp,
        Err(e) => {
            error!(
                "server can't bind udp {}:{}: {}",
                args.server_address, args.server_udp_port, e
            );
            process::exit(constants::EXIT_BAD_CONFIGURATION);
        }
    };
    thread::spawn(move || udp.run());

    // signal loop; the first terminate hands everything to a shutdown
    // thread, a second one force-quits
    let mut shutdown = Some(Shutdown {
        runners: runners,
        router: router.clone(),
        save: args.router_save,
        pass_through_path: args.pass_through_save_path(),
        maths_path: args.maths_save_path(),
    });

    loop {
        match signal.recv() {
            Some(Signal::USR1) => match pipeline {
                Some(ref pipeline) => {
                    pipeline.reload(&args.maths_path());
                }
                None => info!("aggregation module disabled"),
            },
            Some(Signal::USR2) => {
                let state = CurrentState::new(
                    global.clone(),
                    pipeline.clone(),
                    format!("{}:{}", args.client_address, args.client_port),
                    args.buffer_flush_time,
                );
                info!("{}", state.save(&args.current_state_path()));
            }
            Some(signal_type) => match shutdown.take() {
                Some(shutdown) => {
                    info!("exit with signal: {:?}", signal_type);
                    thread::spawn(move || {
                        shutdown.execute();
                        process::exit(0);
                    });
                }
                None => {
                    warn!("force quit");
                    process::exit(constants::EXIT_FORCE_QUIT);
                }
            },
            None => break,
        }
    }
}
