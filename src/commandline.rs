use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::time::Duration;

fn default_device_name() -> String {
    if cfg!(target_os = "windows") {
        String::from("COM1")
    } else {
        String::from("/dev/ttyUSB0")
    }
}

fn parse_channel(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("channels are counted from 1".to_string()),
        Ok(channel) if channel <= 255 => Ok(channel),
        Ok(_) => Err("channel must be at most 255".to_string()),
        Err(err) => Err(err.to_string()),
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Query the board and print the status line of every relay
    Status {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show whether a single relay is open
    Get {
        /// Relay channel as printed on the board, starting at 1
        #[arg(value_parser = parse_channel)]
        channel: usize,
    },
    /// Open or close a single relay
    Set {
        /// Relay channel as printed on the board, starting at 1
        #[arg(value_parser = parse_channel)]
        channel: usize,
        /// Open (energize) the relay. If this flag is not present, it will be closed.
        #[clap(long, short, action)]
        on: bool,
    },
    /// Open or close all relays
    All {
        /// Open (energize) all relays. If this flag is not present, they will be closed.
        #[clap(long, short, action)]
        on: bool,
    },
    /// Open relay 1, print the board status and close all relays again
    Demo,
    /// Periodically query the board and print the status of all relays
    Watch {
        /// Interval between queries (e.g., "1s", "500ms")
        #[clap(long, short, value_parser = humantime::parse_duration, default_value = "1s")]
        interval: Duration,
    },
}

const fn about_text() -> &'static str {
    "LCUS usb relay board command line tool"
}

#[derive(Parser, Debug)]
#[command(version, about=about_text(), long_about = None)]
pub struct CliArgs {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Serial port device path (e.g., /dev/ttyUSB0 on Linux, COM1 on Windows)
    #[arg(short, long, default_value_t = default_device_name())]
    pub device: String,

    #[command(subcommand)]
    pub command: CliCommands,

    // The board sends no end marker after its status lines, a read running into this
    // timeout ends the status response.
    /// Timeout for serial reads (e.g., "500ms", "1s", "2s 500ms")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "500ms")]
    pub timeout: Duration,

    /// Pause after every frame sent to the board (e.g., "10ms", "50ms"), at least 10ms
    #[arg(value_parser = humantime::parse_duration, long, default_value = "10ms")]
    pub delay: Duration,
}
