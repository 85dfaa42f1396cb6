use std::env;
use std::process;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;

use weblog::{error, info};
use webserv::config::AppConfig;
use webserv::server::Server;

fn main() {
    weblog::set_level(weblog::Level::Info);
    info!("webserv starting...");

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        error!("usage: {} <config_file>", args[0]);
        process::exit(1);
    }

    let config = match AppConfig::load(&args[1]) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {}", e);
            process::exit(1);
        }
    };
    info!("found {} server(s) in configuration", config.servers.len());

    // SIGINT/SIGTERM raise the flag; the main loop notices and unwinds.
    // SIGPIPE is already SIG_IGN under the Rust runtime, so a send after
    // client close surfaces as EPIPE.
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        if let Err(e) = flag::register(signal, Arc::clone(&shutdown)) {
            error!("failed to install signal handler: {}", e);
            process::exit(1);
        }
    }

    let mut server = match Server::new(config, shutdown) {
        Ok(server) => server,
        Err(e) => {
            error!("failed to initialize server: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        error!("server error: {}", e);
        process::exit(1);
    }

    info!("webserv shutdown complete");
}
