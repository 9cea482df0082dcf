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

//! fanhal - sensor and fan drivers for a Linux fan-control daemon
//!
//! The scheduler that decides fan levels lives elsewhere. Once per cycle it
//! clears a [`TemperatureBuffer`], lets every [`SensorDriver`] append its
//! readings, picks a [`Level`] and hands it to the [`FanDriver`]. At shutdown
//! the fan is restored to the state it had before the daemon started.
//!
//! ```no_run
//! use fanhal::{FanControl, FanDriver, Level, ReadTemps, SensorDriver, TemperatureBuffer};
//! use fanhal::fan::PlatformFanDriver;
//! use fanhal::sensor::HwmonSensorDriver;
//!
//! fn main() -> fanhal::Result<()> {
//!     let mut sensor = SensorDriver::from(HwmonSensorDriver::new("/sys/class/hwmon/hwmon0/temp1_input")?);
//!     let mut fan = FanDriver::from(PlatformFanDriver::new("/proc/acpi/ibm/fan")?);
//!     fan.init()?;
//!
//!     let mut temps = TemperatureBuffer::new();
//!     sensor.read_temps(&mut temps)?;
//!     let level = if temps.max() > Some(60) { Level::numeric(7) } else { Level::named("auto") };
//!     fan.set_speed(&level)?;
//!     fan.ping_watchdog_and_depulse(&level)?;
//!
//!     fan.restore()
//! }
//! ```

pub mod config;
pub mod fan;
pub mod level;
pub mod logger;
pub mod sensor;
pub mod sysfs;
pub mod temps;

#[cfg(test)]
pub mod test_utils;

pub use fan::{FanControl, FanDriver};
pub use fh_error::{ErrorKind, FanhalError, Result};
pub use level::Level;
pub use sensor::{ReadTemps, SensorDriver};
pub use temps::TemperatureBuffer;
