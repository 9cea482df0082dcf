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

//! thinkpad_acpi fan (`/proc/acpi/ibm/fan`)
//!
//! The control file reads like
//!
//! ```text
//! status:         enabled
//! speed:          2900
//! level:          auto
//! commands:       level <level> (<level> is 0-7, auto, disengaged, full-speed)
//! commands:       enable, disable
//! commands:       watchdog <timeout> (<timeout> is 0 (off), 1-120 (seconds))
//! ```
//!
//! and accepts `level <x>` and `watchdog <seconds>` commands. Once armed, the
//! kernel watchdog puts the fan back into automatic mode if no level command
//! arrives within the timeout.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fh_error::{FanhalError, Result};
use tracing::{debug, error};

use super::{write_level, FanControl};
use crate::level::Level;
use crate::sysfs::{Sysfs, SysfsIo};

pub const DEFAULT_WATCHDOG: Duration = Duration::from_secs(120);

/// The scheduler's sleep between cycles unless told otherwise
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const DISENGAGED: &str = "level disengaged";

/// Used when the control file has no `level:` line to restore from
const FALLBACK_INITIAL_LEVEL: &str = "auto";

pub struct PlatformFanDriver {
    path: PathBuf,
    initial_state: String,
    watchdog: Duration,
    depulse: Duration,
    poll_interval: Duration,
    last_watchdog_ping: Option<Instant>,
    restore_pending: bool,
    io: Box<dyn SysfsIo>,
}

impl PlatformFanDriver {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_io(path, Box::new(Sysfs))
    }

    pub fn with_io(path: impl Into<PathBuf>, io: Box<dyn SysfsIo>) -> Result<Self> {
        let path = path.into();
        let content = io.read_to_string(&path).map_err(|e| {
            FanhalError::io(format!("Failed to initialize fan driver {}", path.display()), e)
        })?;

        let mut initial_state = None;
        let mut ctrl_supported = false;
        for line in content.lines() {
            if line.contains("level:") {
                initial_state = line
                    .trim_end()
                    .rsplit([' ', '\t'])
                    .next()
                    .map(str::to_string);
            } else if line.contains("commands:") && line.contains("level <level>") {
                ctrl_supported = true;
            }
        }

        if !ctrl_supported {
            return Err(FanhalError::system(format!(
                "{} does not accept level commands. Is thinkpad_acpi loaded with fan_control=1?",
                path.display()
            )));
        }

        let initial_state = initial_state
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| FALLBACK_INITIAL_LEVEL.to_string());
        debug!("{}: initial fan level is {}", path.display(), initial_state);

        Ok(Self {
            path,
            initial_state,
            watchdog: DEFAULT_WATCHDOG,
            depulse: Duration::ZERO,
            poll_interval: DEFAULT_POLL_INTERVAL,
            last_watchdog_ping: None,
            restore_pending: true,
            io,
        })
    }

    pub fn set_watchdog(&mut self, timeout: Duration) {
        self.watchdog = timeout;
    }

    pub fn watchdog(&self) -> Duration {
        self.watchdog
    }

    /// Zero disables depulsing
    pub fn set_depulse(&mut self, duration: Duration) {
        self.depulse = duration;
    }

    pub fn depulse(&self) -> Duration {
        self.depulse
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    pub fn last_watchdog_ping(&self) -> Option<Instant> {
        self.last_watchdog_ping
    }

    /// Whether the watchdog would lapse before the next scheduled write.
    /// A deadline past what `Instant` can represent counts as due.
    fn watchdog_due(&self, now: Instant) -> bool {
        match self.last_watchdog_ping {
            None => true,
            Some(last) => now
                .checked_add(self.poll_interval)
                .zip(last.checked_add(self.watchdog))
                .map_or(true, |(next_write, expiry)| next_write >= expiry),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_last_watchdog_ping(&mut self, at: Instant) {
        self.last_watchdog_ping = Some(at);
    }
}

impl FanControl for PlatformFanDriver {
    fn path(&self) -> &Path {
        &self.path
    }

    fn initial_state(&self) -> &str {
        &self.initial_state
    }

    fn init(&self) -> Result<()> {
        self.io
            .write(&self.path, &format!("watchdog {}", self.watchdog.as_secs()))
            .map_err(|e| {
                FanhalError::io(format!("Failed to arm fan watchdog on {}", self.path.display()), e)
            })
    }

    fn set_speed(&mut self, level: &Level) -> Result<()> {
        write_level(&*self.io, &self.path, level.as_str())?;
        self.last_watchdog_ping = Some(Instant::now());
        Ok(())
    }

    /// With depulsing enabled, disengage the fan, block for the depulse
    /// duration and re-apply `level`. Otherwise re-apply `level` only if the
    /// watchdog would expire before the next cycle.
    fn ping_watchdog_and_depulse(&mut self, level: &Level) -> Result<()> {
        if !self.depulse.is_zero() {
            write_level(&*self.io, &self.path, DISENGAGED)?;
            thread::sleep(self.depulse);
            self.set_speed(level)
        } else if self.watchdog_due(Instant::now()) {
            self.set_speed(level)
        } else {
            Ok(())
        }
    }

    fn restore(&mut self) -> Result<()> {
        if !self.restore_pending {
            return Ok(());
        }
        self.restore_pending = false;

        self.io
            .write(&self.path, &format!("level {}", self.initial_state))
            .map_err(|e| {
                FanhalError::io(
                    format!("Failed to reset fan {} to level {}", self.path.display(), self.initial_state),
                    e,
                )
            })?;
        debug!("{}: restored fan level {}", self.path.display(), self.initial_state);
        Ok(())
    }
}

impl Drop for PlatformFanDriver {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            error!("{}", e);
        }
    }
}
