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

//! Fan drivers
//!
//! Two kinds of fan are supported:
//!
//! - [`PlatformFanDriver`]: thinkpad_acpi, typically `/proc/acpi/ibm/fan`.
//!   Text commands, a kernel-side watchdog and optional depulsing.
//! - [`HwmonFanDriver`]: a PWM channel in sysfs (`pwmN` + `pwmN_enable`).
//!
//! Every driver captures the state it found at construction and writes it
//! back in [`FanControl::restore`]. If the owner never calls `restore`, the
//! driver does it on drop and logs a failure instead of panicking.

mod hwmon;
mod platform;

pub use hwmon::HwmonFanDriver;
pub use platform::{PlatformFanDriver, DEFAULT_POLL_INTERVAL, DEFAULT_WATCHDOG};

use std::path::Path;

use fh_error::{FanhalError, Result};

use crate::level::Level;
use crate::sysfs::SysfsIo;

/// What the scheduler can do with a fan
pub trait FanControl {
    fn path(&self) -> &Path;

    /// State captured at construction, written back by [`FanControl::restore`]
    fn initial_state(&self) -> &str;

    /// Take over control of the fan
    fn init(&self) -> Result<()>;

    fn set_speed(&mut self, level: &Level) -> Result<()>;

    /// Called once per cycle after `set_speed`, even when the level did not change.
    fn ping_watchdog_and_depulse(&mut self, level: &Level) -> Result<()>;

    /// Hand the fan back in the state it was found in. Only the first call writes.
    fn restore(&mut self) -> Result<()>;
}

/// The fan variants known at build time
pub enum FanDriver {
    Platform(PlatformFanDriver),
    Hwmon(HwmonFanDriver),
}

impl FanDriver {
    pub fn as_platform_mut(&mut self) -> Option<&mut PlatformFanDriver> {
        match self {
            FanDriver::Platform(fan) => Some(fan),
            FanDriver::Hwmon(_) => None,
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $fan:ident => $body:expr) => {
        match $self {
            FanDriver::Platform($fan) => $body,
            FanDriver::Hwmon($fan) => $body,
        }
    };
}

impl FanControl for FanDriver {
    fn path(&self) -> &Path {
        dispatch!(self, fan => fan.path())
    }

    fn initial_state(&self) -> &str {
        dispatch!(self, fan => fan.initial_state())
    }

    fn init(&self) -> Result<()> {
        dispatch!(self, fan => fan.init())
    }

    fn set_speed(&mut self, level: &Level) -> Result<()> {
        dispatch!(self, fan => fan.set_speed(level))
    }

    fn ping_watchdog_and_depulse(&mut self, level: &Level) -> Result<()> {
        dispatch!(self, fan => fan.ping_watchdog_and_depulse(level))
    }

    fn restore(&mut self) -> Result<()> {
        dispatch!(self, fan => fan.restore())
    }
}

impl From<PlatformFanDriver> for FanDriver {
    fn from(fan: PlatformFanDriver) -> Self {
        FanDriver::Platform(fan)
    }
}

impl From<HwmonFanDriver> for FanDriver {
    fn from(fan: HwmonFanDriver) -> Self {
        FanDriver::Hwmon(fan)
    }
}

/// Write a level to a fan control file.
///
/// A permission error means fan control is not allowed at all (not root, or
/// thinkpad_acpi loaded without `fan_control=1`), which no retry will fix, so
/// it is reported as a system error. Everything else keeps its errno.
pub(crate) fn write_level(io: &dyn SysfsIo, path: &Path, text: &str) -> Result<()> {
    io.write(path, text).map_err(|e| match e.raw_os_error() {
        Some(libc::EPERM) | Some(libc::EACCES) => FanhalError::system(format!(
            "Permission denied on {}. Fan control needs root, and thinkpad_acpi must be loaded with fan_control=1",
            path.display()
        )),
        _ => FanhalError::io(
            format!("Failed to set fan level \"{}\" on {}", text, path.display()),
            e,
        ),
    })
}
