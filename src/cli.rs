//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scopebridge")]
#[command(author, version, about = "Host companion for the scopebridge capture device", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Receive framed files from the device and store them
    Receive {
        /// Serial device (e.g. /dev/ttyUSB0)
        #[arg(short, long)]
        port: String,

        /// Baud rate
        #[arg(short, long, default_value = "115200")]
        baud: u32,

        /// Directory to store received files in
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Exit after the first complete file
        #[arg(long)]
        once: bool,
    },

    /// Frame a local file and send it to the device
    Send {
        /// Serial device
        #[arg(short, long)]
        port: String,

        /// Baud rate
        #[arg(short, long, default_value = "115200")]
        baud: u32,

        /// File to send
        #[arg(short, long)]
        input: PathBuf,

        /// Name to announce (defaults to the input file name)
        #[arg(short, long)]
        name: Option<String>,

        /// Payload bytes per hex line (1-64)
        #[arg(long)]
        stride: Option<usize>,
    },

    /// Decode a saved session log into the original bytes
    Decode {
        /// Captured session log
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the decoded bytes
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List available serial ports
    ListPorts,
}
