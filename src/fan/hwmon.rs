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

//! PWM fan in sysfs
//!
//! `pwmN` takes a duty cycle 0-255; `pwmN_enable` selects the mode
//! (0 = full speed, 1 = manual, 2+ = automatic, meaning depends on the chip).

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use fh_error::{FanhalError, Result};
use tracing::{debug, error};

use super::{write_level, FanControl};
use crate::level::Level;
use crate::sysfs::{Sysfs, SysfsIo};

const MANUAL_MODE: &str = "1";

pub struct HwmonFanDriver {
    path: PathBuf,
    enable_path: PathBuf,
    initial_state: String,
    restore_pending: bool,
    io: Box<dyn SysfsIo>,
}

impl HwmonFanDriver {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_io(path, Box::new(Sysfs))
    }

    pub fn with_io(path: impl Into<PathBuf>, io: Box<dyn SysfsIo>) -> Result<Self> {
        let path = path.into();
        let enable_path = enable_path_for(&path);

        let content = io.read_to_string(&enable_path).map_err(|e| {
            FanhalError::io(
                format!("Failed to read PWM mode from {}", enable_path.display()),
                e,
            )
        })?;
        let initial_state = content.lines().next().unwrap_or("").trim().to_string();
        debug!("{}: initial PWM mode is {:?}", enable_path.display(), initial_state);

        Ok(Self {
            path,
            enable_path,
            initial_state,
            restore_pending: true,
            io,
        })
    }

    pub fn enable_path(&self) -> &Path {
        &self.enable_path
    }
}

fn enable_path_for(path: &Path) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push("_enable");
    PathBuf::from(s)
}

impl FanControl for HwmonFanDriver {
    fn path(&self) -> &Path {
        &self.path
    }

    fn initial_state(&self) -> &str {
        &self.initial_state
    }

    fn init(&self) -> Result<()> {
        self.io.write(&self.enable_path, MANUAL_MODE).map_err(|e| {
            FanhalError::io(
                format!("Failed to enable manual PWM control on {}", self.enable_path.display()),
                e,
            )
        })
    }

    /// Writes the numeric level. Some chips fall back to automatic mode on
    /// resume and then reject PWM writes with EINVAL; in that case manual
    /// mode is re-enabled and the write retried once.
    fn set_speed(&mut self, level: &Level) -> Result<()> {
        let num = level.num().ok_or_else(|| {
            FanhalError::config(format!(
                "{} needs a numeric PWM value, got \"{}\"",
                self.path.display(),
                level
            ))
        })?;
        let value = num.to_string();

        match write_level(&*self.io, &self.path, &value) {
            Err(e) if e.code() == Some(libc::EINVAL) => {
                debug!(
                    "{}: PWM write rejected ({}), re-enabling manual mode. Resumed from suspend?",
                    self.path.display(),
                    e
                );
                self.init()?;
                write_level(&*self.io, &self.path, &value)
            }
            other => other,
        }
    }

    /// hwmon PWM channels have no watchdog and nothing to depulse
    fn ping_watchdog_and_depulse(&mut self, _level: &Level) -> Result<()> {
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        if !self.restore_pending {
            return Ok(());
        }
        self.restore_pending = false;

        self.io
            .write(&self.enable_path, &self.initial_state)
            .map_err(|e| {
                FanhalError::io(
                    format!(
                        "Failed to restore PWM mode {} on {}",
                        self.initial_state,
                        self.enable_path.display()
                    ),
                    e,
                )
            })
    }
}

impl Drop for HwmonFanDriver {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            error!("{}", e);
        }
    }
}
