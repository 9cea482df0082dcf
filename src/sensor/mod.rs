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

//! Sensor drivers
//!
//! Each driver produces a fixed number of readings per cycle and appends them,
//! calibrated, to the [`TemperatureBuffer`] it is handed.

#[cfg(feature = "atasmart")]
mod disk;
#[cfg(feature = "nvml")]
mod gpu;
mod hwmon;
mod platform;

#[cfg(feature = "atasmart")]
pub use disk::{DiskSensorDriver, SmartDisk};
#[cfg(feature = "nvml")]
pub use gpu::{GpuBackend, GpuSensorDriver, NvmlGpu};
pub use hwmon::HwmonSensorDriver;
pub use platform::PlatformSensorDriver;

use std::fs::File;
use std::path::{Path, PathBuf};

use fh_error::{FanhalError, Result};
use tracing::warn;

use crate::temps::TemperatureBuffer;

/// State every sensor driver carries: where it reads from, how many values
/// it yields and how to calibrate them.
#[derive(Debug, Clone)]
pub struct SensorBase {
    path: PathBuf,
    num_temps: usize,
    correction: Vec<i32>,
}

impl SensorBase {
    /// Checks that `path` can be opened for reading
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        File::open(&path)
            .map_err(|e| FanhalError::io(format!("Failed to open sensor {}", path.display()), e))?;
        Ok(Self::new(path))
    }

    /// No filesystem check. For sensors whose path is not a file (a PCI bus id).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            num_temps: 0,
            correction: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn num_temps(&self) -> usize {
        self.num_temps
    }

    pub fn set_num_temps(&mut self, n: usize) {
        self.num_temps = n;
        self.correction.resize(n, 0);
    }

    pub fn corrections(&self) -> &[i32] {
        &self.correction
    }

    pub fn set_correction(&mut self, correction: Vec<i32>) -> Result<()> {
        if correction.len() > self.num_temps {
            return Err(FanhalError::config(format!(
                "Sensor {} has {} temperatures but {} correction values were given",
                self.path.display(),
                self.num_temps,
                correction.len()
            )));
        }
        if correction.len() < self.num_temps {
            warn!(
                "Sensor {} has {} temperatures but only {} correction values. The rest are left uncorrected.",
                self.path.display(),
                self.num_temps,
                correction.len()
            );
        }
        self.correction = correction;
        Ok(())
    }

    /// Offset for reading `idx`, 0 past the end of a short vector
    pub fn correction(&self, idx: usize) -> i32 {
        self.correction.get(idx).copied().unwrap_or(0)
    }

    /// `temp` with the offset for reading `idx` applied
    pub fn corrected(&self, idx: usize, temp: i32) -> Result<i32> {
        temp.checked_add(self.correction(idx)).ok_or_else(|| {
            FanhalError::system(format!(
                "{}: Temperature {} with correction {} is out of range",
                self.path.display(),
                temp,
                self.correction(idx)
            ))
        })
    }
}

/// What the scheduler can do with a sensor
pub trait ReadTemps {
    fn base(&self) -> &SensorBase;

    fn base_mut(&mut self) -> &mut SensorBase;

    /// Append `num_temps()` readings to `temps`. On error some of them may
    /// already have been appended.
    fn read_temps(&mut self, temps: &mut TemperatureBuffer) -> Result<()>;

    fn num_temps(&self) -> usize {
        self.base().num_temps()
    }

    fn path(&self) -> &Path {
        self.base().path()
    }

    fn set_correction(&mut self, correction: Vec<i32>) -> Result<()> {
        self.base_mut().set_correction(correction)
    }
}

/// The sensor variants known at build time
pub enum SensorDriver {
    Hwmon(HwmonSensorDriver),
    Platform(PlatformSensorDriver),
    #[cfg(feature = "atasmart")]
    Disk(DiskSensorDriver),
    #[cfg(feature = "nvml")]
    Gpu(GpuSensorDriver),
}

macro_rules! dispatch {
    ($self:expr, $sensor:ident => $body:expr) => {
        match $self {
            SensorDriver::Hwmon($sensor) => $body,
            SensorDriver::Platform($sensor) => $body,
            #[cfg(feature = "atasmart")]
            SensorDriver::Disk($sensor) => $body,
            #[cfg(feature = "nvml")]
            SensorDriver::Gpu($sensor) => $body,
        }
    };
}

impl SensorDriver {
    /// Release native resources. Only the GPU sensor holds any.
    pub fn shutdown(&mut self) -> Result<()> {
        match self {
            #[cfg(feature = "nvml")]
            SensorDriver::Gpu(gpu) => gpu.shutdown(),
            _ => Ok(()),
        }
    }
}

impl ReadTemps for SensorDriver {
    fn base(&self) -> &SensorBase {
        dispatch!(self, sensor => sensor.base())
    }

    fn base_mut(&mut self) -> &mut SensorBase {
        dispatch!(self, sensor => sensor.base_mut())
    }

    fn read_temps(&mut self, temps: &mut TemperatureBuffer) -> Result<()> {
        dispatch!(self, sensor => sensor.read_temps(temps))
    }
}

impl From<HwmonSensorDriver> for SensorDriver {
    fn from(sensor: HwmonSensorDriver) -> Self {
        SensorDriver::Hwmon(sensor)
    }
}

impl From<PlatformSensorDriver> for SensorDriver {
    fn from(sensor: PlatformSensorDriver) -> Self {
        SensorDriver::Platform(sensor)
    }
}

#[cfg(feature = "atasmart")]
impl From<DiskSensorDriver> for SensorDriver {
    fn from(sensor: DiskSensorDriver) -> Self {
        SensorDriver::Disk(sensor)
    }
}

#[cfg(feature = "nvml")]
impl From<GpuSensorDriver> for SensorDriver {
    fn from(sensor: GpuSensorDriver) -> Self {
        SensorDriver::Gpu(sensor)
    }
}
