use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twin_turntable_bridge::{
    actuator::{self, MidiActuator},
    config::{Config, DEFAULT_CONFIG_PATH},
    joystick::{DeviceBridge, JoystickEvents, NullEvents, Side, TracingEvents},
};

const IDLE_SLEEP: Duration = Duration::from_millis(50);

#[derive(Debug, Parser)]
#[command(name = "twin-turntable-bridge")]
#[command(about = "Bridge turntable controllers to MIDI output lines", long_about = None)]
struct Cli {
    /// YAML configuration file; defaults are used when it does not exist.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decode and log events without opening a MIDI port.
    #[arg(long)]
    dry_run: bool,

    /// Print the available MIDI output ports and exit.
    #[arg(long)]
    list_midi_ports: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if cli.list_midi_ports {
        for name in actuator::list_ports()? {
            println!("{name}");
        }
        return Ok(());
    }

    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("invalid configuration: {}", cli.config.display()))?;

    if cli.dry_run {
        return run(&config, |_| TracingEvents::new(NullEvents));
    }

    let midi = MidiActuator::connect(&config.midi, config.pin_map()?)
        .context("failed to open MIDI output")?;
    tracing::info!(port = midi.port_name(), "MIDI output ready");
    run(&config, move |_| TracingEvents::new(midi.clone()))
}

/// Poll controllers forever, handing each new device the handler from `make_events`.
fn run<H, F>(config: &Config, mut make_events: F) -> anyhow::Result<()>
where
    H: JoystickEvents,
    F: FnMut(Side) -> H,
{
    let pins = config.pin_map()?;
    let mut bridge = DeviceBridge::new(config.device.clone(), config.sides.clone(), |side| {
        config.parser(side, pins.clone(), make_events(side))
    })
    .context("failed to initialise libusb")?;

    if bridge.rescan().context("failed to enumerate USB devices")? == 0 {
        tracing::warn!(
            vendor_id = format_args!("0x{:04x}", config.device.vendor_id),
            product_id = format_args!("0x{:04x}", config.device.product_id),
            "no controller found, waiting for one to be attached"
        );
    }

    loop {
        if let Err(err) = bridge.rescan_if_due(Instant::now()) {
            tracing::warn!(error = %err, "USB rescan failed");
        }

        bridge.poll_all();

        if bridge.devices().is_empty() {
            thread::sleep(IDLE_SLEEP);
        }
    }
}
