use anyhow::{Context, Result};
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use lcus_relay_lib::{protocol::QueryStatus, serialport::SerialTransport, Device};
use log::*;
use std::{any::Any, panic};

mod commandline;

use commandline::{CliArgs, CliCommands, OutputFormat};

fn panic_cause(payload: &(dyn Any + Send)) -> &str {
    if let Some(cause) = payload.downcast_ref::<&str>() {
        *cause
    } else if let Some(cause) = payload.downcast_ref::<String>() {
        cause.as_str()
    } else {
        "<cause unknown>"
    }
}

// Panics are reported through the logger too.
fn logging_init(loglevel: LevelFilter) -> Result<LoggerHandle> {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .with_context(|| "Cannot init logging")?
        .start()
        .with_context(|| "Cannot start logging")?;

    panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "<unknown>".to_string());
        error!(
            "Thread '{}' panicked at {location}: {}",
            std::thread::current().name().unwrap_or("<unknown>"),
            panic_cause(panic_info.payload())
        );
    }));
    Ok(log_handle)
}

fn print_lines(lines: &[Vec<u8>]) {
    for line in lines {
        println!("{}", String::from_utf8_lossy(line));
    }
}

fn run(device: &mut Device<SerialTransport>, command: CliCommands) -> Result<()> {
    match command {
        CliCommands::Status { format } => {
            let lines = device
                .query_relay_status()
                .with_context(|| "Cannot query relay status")?;
            match format {
                OutputFormat::Text => print_lines(&lines),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&QueryStatus::report(lines.as_slice()))?
                ),
            }
        }
        CliCommands::Get { channel } => {
            let open = device
                .relay(channel - 1)
                .with_context(|| format!("Cannot get relay {channel}"))?;
            println!(
                "Relay {channel}: {}",
                if open { "open" } else { "closed" }
            );
        }
        CliCommands::Set { channel, on } => device
            .set_relay(channel - 1, on)
            .with_context(|| format!("Cannot set relay {channel}"))?,
        CliCommands::All { on } => device
            .set_all(on)
            .with_context(|| "Cannot set all relays")?,
        CliCommands::Demo => {
            device
                .set_relay(0, true)
                .with_context(|| "Cannot open relay 1")?;
            let lines = device
                .query_relay_status()
                .with_context(|| "Cannot query relay status")?;
            print_lines(&lines);
            if device.relay(0)? {
                println!("The first relay is open.");
            }
            device
                .set_all(false)
                .with_context(|| "Cannot close all relays")?;
        }
        CliCommands::Watch { interval } => {
            info!("Starting watch mode: interval={interval:?}");
            loop {
                match device.query_relay_status() {
                    Ok(lines) => {
                        println!("--- Status at {} ---", chrono::Local::now().to_rfc3339());
                        print_lines(&lines);
                        println!("--------------------------");
                    }
                    Err(e) => error!("Error querying relay status: {e}"),
                }
                std::thread::sleep(interval);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter())?;

    let transport = SerialTransport::open(&args.device, args.timeout)
        .with_context(|| format!("Cannot open serial port '{}'", args.device))?;
    let mut device = Device::lazy(transport);
    device.set_delay(args.delay);
    // status and watch query the board themselves
    if !matches!(
        args.command,
        CliCommands::Status { .. } | CliCommands::Watch { .. }
    ) {
        device
            .query_relay_status()
            .with_context(|| "Cannot query relay status")?;
        info!(
            "Found {} relays on '{}'",
            device.relay_count()?,
            args.device
        );
    }

    let result = run(&mut device, args.command);

    // The port is closed when the transport is dropped.
    if let Err(e) = device.flush() {
        warn!("Cannot flush serial connection: {e}");
    }
    result
}
