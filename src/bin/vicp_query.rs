
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use log::error;

use vicp::config::ConnectionConfig;
use vicp::connection::{DsoConnection, VicpConnection};
use vicp::errors::{DsoError, Result};

/// Send commands and queries to an oscilloscope over VICP
#[derive(Parser, Debug)]
#[command(name = "vicp-query", version)]
struct Args {
    /// IP address or host name of the instrument
    host: String,

    /// Commands to send in order; anything containing '?' is sent as a query and the reply printed
    commands: Vec<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// I/O timeout in seconds
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Seconds to wait between sending a query and reading its reply
    #[arg(short, long)]
    delay: Option<f64>,

    /// JSON connection settings; the host and any options given here override them
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the *IDN? identity as JSON
    #[arg(long)]
    identify: bool,

    /// Issue a device clear before the commands
    #[arg(long)]
    clear: bool,
}

fn run(args:Args) -> Result<()> {
    let mut config:ConnectionConfig = match &args.config {
        Some(path) => ConnectionConfig::load(path)?,
        None       => ConnectionConfig::new(&args.host),
    };

    config.host = args.host.clone();
    if let Some(port) = args.port { config.port = port; }
    if let Some(timeout) = args.timeout { config.timeout_sec = timeout; }

    let query_delay:Option<Duration> = match args.delay {
        Some(d) => Some(vicp::config::check_timeout("delay", d)?),
        None    => None,
    };

    let mut scope = VicpConnection::with_config(&config)?;

    if args.clear { scope.device_clear()?; }

    if args.identify {
        let identity = scope.identify()?;
        println!("{}", serde_json::to_string_pretty(&identity)?);
    }

    for cmd in &args.commands {
        if cmd.contains('?') {
            println!("{}", scope.query(cmd, query_delay)?);
        } else if !scope.write(cmd)? {
            return Err(DsoError::Io(format!("Write to device failed: {}", cmd)));
        }
    }

    scope.disconnect();
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Args::parse()) {
        error!("{}", e);
        eprintln!("{}", e);
        process::exit(1);
    }
}
