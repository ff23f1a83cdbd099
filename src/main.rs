//! scopebridge - Host companion for the parallel-port capture bridge
//!
//! The device streams captured files over its serial link using a
//! line-oriented hex framing (`BEGIN:` / `SIZE:` / hex lines /
//! `END:`). This tool is the other end of that wire: it receives and
//! stores framed files, pushes local files to the device the same
//! way, and decodes saved session logs offline.

mod cli;
mod commands;
mod error;
mod transport;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::Receive {
            port,
            baud,
            dir,
            once,
        } => commands::run_receive(&port, baud, &dir, once),
        Commands::Send {
            port,
            baud,
            input,
            name,
            stride,
        } => commands::run_send(&port, baud, &input, name.as_deref(), stride),
        Commands::Decode { input, output } => commands::run_decode(&input, &output),
        Commands::ListPorts => commands::list_ports(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
