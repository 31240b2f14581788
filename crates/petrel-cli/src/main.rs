use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use petrel_gps::aprs::{self, Beacon, BeaconCell, GpsLink};
use petrel_gps::{doctor as gps_doctor, GpsConfig};
use petrel_power::eps::{BusVoltageSource, EpsSampler, SysfsVoltage, DEFAULT_VOLTAGE_PATH};
use petrel_power::watchdog::{ModeTransitions, PowerWatchdog, DEFAULT_THRESHOLD_VOLTS};
use petrel_power::{doctor as power_doctor, PowerConfig};
use petrel_radio::link::TtyLink;
use petrel_radio::listener as radio_listener;
use petrel_radio::protocol::{response_code, Command as ModemCommand, ResponseOutcome};
use petrel_radio::radio::Radio;
use petrel_radio::{doctor as radio_doctor, RadioConfig};
use petrel_state::boot::consume_first_boot_marker;
use petrel_state::clock::ClockTask;
use petrel_state::mode::{PowerMode, PowerModeCell};
use petrel_state::registry::StateRegistry;
use petrel_supervisor::{SupervisionPolicy, Supervisor, SupervisorHandle, SupervisorOptions};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "petrel", version, about = "Petrel - CubeSat Flight Control Software")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Doctor,
    Run,
    Radio {
        #[command(subcommand)]
        cmd: RadioCmd,
    },
}

#[derive(Debug, Subcommand)]
enum RadioCmd {
    /// Open the modem tty and report link state and signal quality.
    Status,
    /// Run the network readiness check; blocks until the constellation
    /// is in view.
    Check {
        #[arg(long, default_value_t = 5)]
        attempts: u32,
    },
    /// Send one raw command line to the modem.
    Send { line: String },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    radio: RadioConfig,

    gps: Option<GpsConfig>,
    power: Option<PowerConfig>,
    flight: Option<FlightCfg>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct FlightCfg {
    first_boot_marker: Option<String>,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Run => run(&cfg)?,
        Command::Radio { cmd } => radio_cmd(&cfg, cmd)?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    radio_doctor::check_link_config(&cfg.radio)?;
    if let Some(gps) = &cfg.gps {
        gps_doctor::check_aprs_config(gps)?;
    }
    let power = cfg.power.clone().unwrap_or_default();
    power_doctor::check_power_config(&power)?;

    // Hardware may be absent on a bench build; warn instead of failing.
    let voltage_path =
        power.voltage_path.clone().unwrap_or_else(|| DEFAULT_VOLTAGE_PATH.to_string());
    SysfsVoltage::new(&voltage_path)
        .read_volts()
        .map(|volts| info!("doctor: battery bus at {volts}V"))
        .or_else(|e| {
            warn!("voltage sensor unreadable: {:#}", e);
            Ok::<(), anyhow::Error>(())
        })?;
    if !Path::new(&cfg.radio.serial_dev).exists() {
        warn!("modem tty absent: {}", cfg.radio.serial_dev);
    }
    if let Some(gps) = &cfg.gps {
        if !Path::new(&gps.serial_dev).exists() {
            warn!("aprs tty absent: {}", gps.serial_dev);
        }
    }

    info!("doctor: OK");
    Ok(())
}

fn open_radio(cfg: &Config) -> Radio {
    let link = TtyLink::new(
        &cfg.radio.serial_dev,
        cfg.radio.baud,
        Duration::from_millis(cfg.radio.read_timeout_ms.unwrap_or(1_000)),
    );
    Radio::new(Box::new(link), &cfg.radio)
}

fn radio_cmd(cfg: &Config, cmd: RadioCmd) -> Result<()> {
    let mut radio = open_radio(cfg);
    match cmd {
        RadioCmd::Status => {
            radio.enable();
            if !radio.link_open() {
                println!("link=down");
                return Ok(());
            }
            println!("link=up");
            match radio.command(ModemCommand::SignalQuality) {
                ResponseOutcome::Ok(payload) => match response_code(&payload) {
                    Some(code) => println!("signal={}", code),
                    None => println!("signal=unparsed {:?}", payload),
                },
                other => println!("signal=unavailable ({:?})", other),
            }
            Ok(())
        }
        RadioCmd::Check { attempts } => {
            radio.enable();
            anyhow::ensure!(radio.link_open(), "modem tty did not open");
            let ready = radio.check_ready(attempts)?;
            println!("ready={}", ready);
            Ok(())
        }
        RadioCmd::Send { line } => {
            radio.enable();
            anyhow::ensure!(radio.link_open(), "modem tty did not open");
            match radio.exchange(&line) {
                ResponseOutcome::Ok(payload) => {
                    println!("OK");
                    if !payload.is_empty() {
                        println!("{}", payload);
                    }
                }
                ResponseOutcome::ProtocolError(payload) => {
                    println!("ERROR");
                    if !payload.is_empty() {
                        println!("{}", payload);
                    }
                }
                ResponseOutcome::LinkUnavailable => anyhow::bail!("modem link lost"),
            }
            Ok(())
        }
    }
}

/// Mode-transition handlers for the flight configuration.
///
/// Entering low power pauses the modem listener before closing the
/// link, so the dormant unit cannot reopen it behind our back; leaving
/// low power reverses the two in the opposite order.
struct FlightModes {
    radio: Arc<Mutex<Radio>>,
    radio_listener: SupervisorHandle,
    beacon_period: Option<Arc<BeaconCell>>,
    mode: Arc<PowerModeCell>,
}

impl ModeTransitions for FlightModes {
    fn enter_normal(&mut self, reason: &str) {
        info!("entering normal mode: {reason}");
        self.radio.lock().unwrap().enable();
        self.radio_listener.resume();
        if let Some(period) = &self.beacon_period {
            period.set_secs(aprs::BEACON_NORMAL_SECS);
        }
        self.mode.store(PowerMode::Normal);
    }

    fn enter_low_power(&mut self, reason: &str) {
        warn!("entering low-power mode: {reason}");
        self.radio_listener.pause();
        self.radio.lock().unwrap().disable();
        if let Some(period) = &self.beacon_period {
            period.set_secs(aprs::BEACON_LOW_POWER_SECS);
        }
        self.mode.store(PowerMode::LowPower);
    }

    fn enter_emergency(&mut self, reason: &str) {
        warn!("entering emergency mode: {reason}");
        self.radio_listener.pause();
        self.radio.lock().unwrap().disable();
        if let Some(period) = &self.beacon_period {
            period.set_secs(aprs::BEACON_LOW_POWER_SECS);
        }
        self.mode.store(PowerMode::Emergency);
    }
}

fn run(cfg: &Config) -> Result<()> {
    info!("run: starting");

    let flight = cfg.flight.clone().unwrap_or_default();
    let marker = PathBuf::from(
        flight.first_boot_marker.unwrap_or_else(|| "first_boot.txt".to_string()),
    );
    if consume_first_boot_marker(&marker)? {
        info!("run: first boot");
    }

    let registry = Arc::new(StateRegistry::new());
    // Boot in the low-power posture; the first watchdog poll promotes
    // the spacecraft if the battery allows.
    let mode = Arc::new(PowerModeCell::new(PowerMode::LowPower));
    let power_cfg = cfg.power.clone().unwrap_or_default();

    {
        let clock = ClockTask::new(registry.clone());
        Supervisor::new(
            move || clock.run(),
            SupervisorOptions { name: Some("clock".to_string()), quiet: true, ..Default::default() },
        )
        .start();
    }

    let voltage_path =
        power_cfg.voltage_path.clone().unwrap_or_else(|| DEFAULT_VOLTAGE_PATH.to_string());
    {
        let mut sampler = EpsSampler::new(
            Box::new(SysfsVoltage::new(&voltage_path)),
            registry.clone(),
            Duration::from_millis(power_cfg.sample_ms.unwrap_or(1_000)),
        );
        Supervisor::new(
            move || sampler.run(),
            SupervisorOptions { name: Some("eps-sampler".to_string()), ..Default::default() },
        )
        .start();
    }

    let radio = Arc::new(Mutex::new(open_radio(cfg)));
    let radio_listener_handle = {
        let radio = radio.clone();
        let idle = Duration::from_millis(cfg.radio.idle_poll_ms.unwrap_or(500));
        Supervisor::new(
            move || radio_listener::run_listener(&radio, idle),
            SupervisorOptions {
                name: Some("radio-listener".to_string()),
                policy: SupervisionPolicy::Controllable,
                ..Default::default()
            },
        )
        .start()
    };

    let mut beacon_period: Option<Arc<BeaconCell>> = None;
    if let Some(gps_cfg) = &cfg.gps {
        let link = Arc::new(Mutex::new(GpsLink::open(gps_cfg)?));
        let period = Arc::new(BeaconCell::new(aprs::BEACON_LOW_POWER_SECS));
        let idle = Duration::from_millis(gps_cfg.idle_poll_ms.unwrap_or(500));

        {
            let link = link.clone();
            Supervisor::new(
                move || aprs::run_listener(&link, idle),
                SupervisorOptions { name: Some("gps-listener".to_string()), ..Default::default() },
            )
            .start();
        }
        {
            let mut beacon =
                Beacon::new(link.clone(), registry.clone(), mode.clone(), period.clone());
            Supervisor::new(
                move || beacon.run(),
                SupervisorOptions { name: Some("gps-beacon".to_string()), ..Default::default() },
            )
            .start();
        }
        if gps_cfg.console.unwrap_or(false) {
            let link = link.clone();
            Supervisor::new(
                move || aprs::run_console(&link),
                SupervisorOptions {
                    name: Some("gps-console".to_string()),
                    policy: SupervisionPolicy::Controllable,
                    ..Default::default()
                },
            )
            .start();
        }
        beacon_period = Some(period);
    }

    {
        let transitions = FlightModes {
            radio: radio.clone(),
            radio_listener: radio_listener_handle.clone(),
            beacon_period,
            mode: mode.clone(),
        };
        let mut watchdog = PowerWatchdog::new(
            Box::new(SysfsVoltage::new(&voltage_path)),
            mode.clone(),
            Box::new(transitions),
            power_cfg.threshold_volts.unwrap_or(DEFAULT_THRESHOLD_VOLTS),
            Duration::from_millis(power_cfg.poll_ms.unwrap_or(1_000)),
        );
        Supervisor::new(
            move || watchdog.run(),
            SupervisorOptions { name: Some("power-watchdog".to_string()), ..Default::default() },
        )
        .start();
    }

    info!("run: all units started");
    loop {
        thread::sleep(Duration::from_secs(1));
    }
}
