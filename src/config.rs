//! Provides the CLI option parser and the main settings file loader.
//!
//! The settings live in `<config-dir>/graphite-proxy.toml`; every key has a
//! default so a missing file or a sparse one still yields a runnable
//! configuration. The aggregation rules sit in their own file next to it,
//! handled by the `maths::config` module.

use clap::{App, Arg};
use toml;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

/// Name of the main settings file inside the configuration directory.
pub const MAIN_CONFIG_FILE: &'static str = "graphite-proxy.toml";

#[derive(Clone, Debug)]
pub struct Args {
    pub config_dir: PathBuf,
    pub server_address: String,
    pub server_port: u16,
    pub server_udp_port: u16,
    pub client_address: String,
    pub client_port: u16,
    pub buffer_flush_size: usize,
    pub buffer_flush_time: u64,
    pub buffer_drop_oldest: bool,
    pub cleaning_activated: bool,
    pub cleaning_time: u64,
    pub cleaning_max_empty_time: u32,
    pub maths_enabled: bool,
    pub maths_file: String,
    pub maths_size: usize,
    pub maths_time: u64,
    pub stats_enabled: bool,
    pub stats_time: u64,
    pub router_save: bool,
    pub router_pass_through_file: String,
    pub router_maths_file: String,
    pub logs_level: String,
    pub logs_colors: bool,
    pub logs_destination: String,
    pub current_state_file: String,
}

impl Default for Args {
    fn default() -> Args {
        Args {
            config_dir: PathBuf::new(),
            server_address: "127.0.0.1".to_string(),
            server_port: 8090,
            server_udp_port: 8091,
            client_address: "127.0.0.1".to_string(),
            client_port: 2003,
            buffer_flush_size: 10_000,
            buffer_flush_time: 5,
            buffer_drop_oldest: true,
            cleaning_activated: true,
            cleaning_time: 300,
            cleaning_max_empty_time: 3,
            maths_enabled: true,
            maths_file: "maths.toml".to_string(),
            maths_size: 9999,
            maths_time: 60,
            stats_enabled: true,
            stats_time: 600,
            router_save: true,
            router_pass_through_file: "pass_through_messages.gp".to_string(),
            router_maths_file: "maths_messages.gp".to_string(),
            logs_level: "warning".to_string(),
            logs_colors: false,
            logs_destination: "stdout".to_string(),
            current_state_file: "current_state.gp".to_string(),
        }
    }
}

impl Args {
    pub fn maths_path(&self) -> PathBuf {
        self.config_dir.join(&self.maths_file)
    }

    pub fn pass_through_save_path(&self) -> PathBuf {
        self.config_dir.join(&self.router_pass_through_file)
    }

    pub fn maths_save_path(&self) -> PathBuf {
        self.config_dir.join(&self.router_maths_file)
    }

    pub fn current_state_path(&self) -> PathBuf {
        self.config_dir.join(&self.current_state_file)
    }
}

/// Parse argv. `-c`/`--config-dir` is required; `clap` handles help and
/// version output itself.
pub fn parse_args() -> Result<Args, String> {
    let matches = App::new("graphite-proxy")
        .version(VERSION.unwrap_or("unknown"))
        .version_short("v")
        .about("buffering and aggregating proxy for Graphite plain-text metrics")
        .arg(
            Arg::with_name("config-dir")
                .long("config-dir")
                .short("c")
                .value_name("dir")
                .help("Directory holding graphite-proxy.toml and the aggregation rules file.")
                .takes_value(true)
                .required(true),
        )
        .get_matches();

    let config_dir = matches.value_of("config-dir").expect("config-dir is required");
    load(Path::new(config_dir))
}

/// Load the main settings file from a configuration directory. A missing
/// file falls back to the defaults; an unreadable or unparsable one is an
/// error.
pub fn load(config_dir: &Path) -> Result<Args, String> {
    let mut args = Args::default();
    args.config_dir = config_dir.to_path_buf();

    let path = config_dir.join(MAIN_CONFIG_FILE);
    let mut buffer = String::new();
    match File::open(&path) {
        Ok(mut file) => {
            file.read_to_string(&mut buffer)
                .map_err(|e| format!("can't read configuration file {}: {}", path.display(), e))?;
        }
        Err(_) => {
            warn!("can't read configuration file {}, using defaults", path.display());
            return Ok(args);
        }
    }

    parse_config_file(&buffer, args)
}

/// Fill an `Args` from a settings document, keeping defaults for anything
/// absent.
pub fn parse_config_file(buffer: &str, mut args: Args) -> Result<Args, String> {
    let value: toml::Value =
        toml::from_str(buffer).map_err(|e| format!("could not parse config file: {}", e))?;

    if let Some(server) = value.get("server") {
        if let Some(address) = server.get("address").and_then(|v| v.as_str()) {
            args.server_address = address.to_string();
        }
        if let Some(port) = server.get("port").and_then(|v| v.as_integer()) {
            args.server_port = port as u16;
        }
        if let Some(port) = server.get("udp-port").and_then(|v| v.as_integer()) {
            args.server_udp_port = port as u16;
        }
    }

    if let Some(client) = value.get("client") {
        if let Some(address) = client.get("address").and_then(|v| v.as_str()) {
            args.client_address = address.to_string();
        }
        if let Some(port) = client.get("port").and_then(|v| v.as_integer()) {
            args.client_port = port as u16;
        }
    }

    if let Some(buffer) = value.get("buffer") {
        if let Some(flush) = buffer.get("flush") {
            if let Some(size) = flush.get("size").and_then(|v| v.as_integer()) {
                args.buffer_flush_size = size as usize;
            }
            if let Some(time) = flush.get("time").and_then(|v| v.as_integer()) {
                args.buffer_flush_time = time as u64;
            }
        }
        if let Some(drop) = buffer.get("drop") {
            if let Some(oldest) = drop.get("oldest").and_then(|v| v.as_bool()) {
                args.buffer_drop_oldest = oldest;
            }
        }
        if let Some(cleaning) = buffer.get("cleaning") {
            if let Some(activated) = cleaning.get("activated").and_then(|v| v.as_bool()) {
                args.cleaning_activated = activated;
            }
            if let Some(time) = cleaning.get("time").and_then(|v| v.as_integer()) {
                args.cleaning_time = time as u64;
            }
            if let Some(max) = cleaning.get("max-empty-time").and_then(|v| v.as_integer()) {
                args.cleaning_max_empty_time = max as u32;
            }
        }
    }

    if let Some(maths) = value.get("maths") {
        if let Some(enabled) = maths.get("enabled").and_then(|v| v.as_bool()) {
            args.maths_enabled = enabled;
        }
        if let Some(file) = maths.get("file").and_then(|v| v.as_str()) {
            args.maths_file = file.to_string();
        }
        if let Some(size) = maths.get("size").and_then(|v| v.as_integer()) {
            args.maths_size = size as usize;
        }
        if let Some(time) = maths.get("time").and_then(|v| v.as_integer()) {
            args.maths_time = time as u64;
        }
    }

    if let Some(stats) = value.get("stats") {
        if let Some(enabled) = stats.get("enabled").and_then(|v| v.as_bool()) {
            args.stats_enabled = enabled;
        }
        if let Some(time) = stats.get("time").and_then(|v| v.as_integer()) {
            args.stats_time = time as u64;
        }
    }

    if let Some(router) = value.get("router") {
        if let Some(save) = router.get("save").and_then(|v| v.as_bool()) {
            args.router_save = save;
        }
        if let Some(file) = router.get("pass-through").and_then(|v| v.as_str()) {
            args.router_pass_through_file = file.to_string();
        }
        if let Some(file) = router.get("maths").and_then(|v| v.as_str()) {
            args.router_maths_file = file.to_string();
        }
    }

    if let Some(logs) = value.get("logs") {
        if let Some(level) = logs.get("level").and_then(|v| v.as_str()) {
            args.logs_level = level.to_string();
        }
        if let Some(colors) = logs.get("colors").and_then(|v| v.as_bool()) {
            args.logs_colors = colors;
        }
        if let Some(destination) = logs.get("destination").and_then(|v| v.as_str()) {
            args.logs_destination = destination.to_string();
        }
    }

    if let Some(signals) = value.get("signals") {
        if let Some(state) = signals.get("current-state") {
            if let Some(file) = state.get("file").and_then(|v| v.as_str()) {
                args.current_state_file = file.to_string();
            }
        }
    }

    Ok(args)
}
