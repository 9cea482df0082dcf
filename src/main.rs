/*
 * This file is part of fanhal.
 *
 * Copyright (C) 2025 fanhal contributors
 *
 * fanhal is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * fanhal is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with fanhal. If not, see <https://www.gnu.org/licenses/>.
 */

mod cli;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, error, info, warn};

use cli::{Cli, Commands, FanArgs, SensorsArgs};
use fanhal::config::{build_fan, build_sensors, config_path, load_config, DriverConfig};
use fanhal::logger;
use fanhal::{FanControl, FanDriver, Level, ReadTemps, SensorDriver, TemperatureBuffer};

/// Granularity at which sleeps notice a termination signal
const SIGNAL_CHECK: Duration = Duration::from_millis(100);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = logger::resolve_log_level(cli.log_level.as_deref());
    let target = logger::init_logging(&level);
    debug!("fanhal {} logging to {:?}", env!("CARGO_PKG_VERSION"), target);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))
        .context("Failed to install signal handler")?;

    match cli.command {
        Commands::Sensors(args) => run_sensors(args, &running),
        Commands::Fan(args) => run_fan(args, &running),
    }
}

fn load(path: Option<PathBuf>) -> anyhow::Result<DriverConfig> {
    let path = path.unwrap_or_else(config_path);
    load_config(&path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Sleep for `duration` or until `running` is cleared. Returns whether still running.
fn sleep_while_running(duration: Duration, running: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(SIGNAL_CHECK.min(deadline - now));
    }
    false
}

fn read_cycle(sensors: &mut [SensorDriver], temps: &mut TemperatureBuffer) -> fanhal::Result<()> {
    temps.clear();
    for sensor in sensors.iter_mut() {
        sensor.read_temps(temps)?;
    }
    Ok(())
}

fn run_sensors(args: SensorsArgs, running: &AtomicBool) -> anyhow::Result<()> {
    let cfg = load(args.config)?;
    let mut sensors = build_sensors(&cfg).context("Failed to set up sensors")?;
    let expected: usize = sensors.iter().map(|s| s.num_temps()).sum();
    info!("{} sensor(s), {} temperature(s) per cycle", sensors.len(), expected);

    let mut temps = TemperatureBuffer::with_capacity(expected);
    let mut cycle = 0u64;
    loop {
        match read_cycle(&mut sensors, &mut temps) {
            Ok(()) => println!("{}", serde_json::to_string(&temps)?),
            Err(e) => warn!("Discarding cycle {}: {}", cycle, e),
        }
        cycle += 1;

        if args.cycles != 0 && cycle >= args.cycles {
            break;
        }
        if !sleep_while_running(cfg.poll_interval(), running) {
            break;
        }
    }

    for sensor in sensors.iter_mut() {
        if let Err(e) = sensor.shutdown() {
            error!("{}: {}", sensor.path().display(), e);
        }
    }
    Ok(())
}

fn deadline_after(seconds: u64) -> anyhow::Result<Instant> {
    Instant::now()
        .checked_add(Duration::from_secs(seconds))
        .with_context(|| format!("--seconds {} is too far in the future", seconds))
}

fn hold_level(
    fan: &mut FanDriver,
    level: &Level,
    poll_interval: Duration,
    deadline: Option<Instant>,
    running: &AtomicBool,
) -> fanhal::Result<()> {
    fan.init()?;
    fan.set_speed(level)?;
    info!("{}: holding {}", fan.path().display(), level);

    loop {
        let nap = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(());
                }
                poll_interval.min(deadline - now)
            }
            None => poll_interval,
        };
        if !sleep_while_running(nap, running) {
            return Ok(());
        }
        fan.ping_watchdog_and_depulse(level)?;
    }
}

fn run_fan(args: FanArgs, running: &AtomicBool) -> anyhow::Result<()> {
    if unsafe { libc::geteuid() } != 0 {
        bail!("fanhal fan requires root privileges to write fan control files");
    }

    let cfg = load(args.config)?;
    let mut fan = build_fan(&cfg).context("Failed to set up fan")?;
    let deadline = args.seconds.map(deadline_after).transpose()?;

    let held = hold_level(&mut fan, &args.level, cfg.poll_interval(), deadline, running);
    if let Err(e) = &held {
        error!("{}", e);
    }

    match fan.restore() {
        Ok(()) => info!("{}: restored {}", fan.path().display(), fan.initial_state()),
        Err(e) => {
            error!("{}", e);
            held?;
            return Err(e.into());
        }
    }
    held.map_err(Into::into)
}
