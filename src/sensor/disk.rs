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

//! Disk temperature via S.M.A.R.T. (libatasmart)

use std::path::PathBuf;

use fh_error::{FanhalError, Result};
use fh_native::SkDisk;

use super::{ReadTemps, SensorBase};
use crate::temps::TemperatureBuffer;

const ZERO_CELSIUS_MKELVIN: f64 = 273_150.0;

/// The calls the disk sensor makes on an open device
#[cfg_attr(test, mockall::automock)]
pub trait SmartDisk: Send {
    fn is_sleeping(&mut self) -> Result<bool>;

    fn read_smart_data(&mut self) -> Result<()>;

    fn temperature_mkelvin(&mut self) -> Result<u64>;
}

impl SmartDisk for SkDisk {
    fn is_sleeping(&mut self) -> Result<bool> {
        SkDisk::is_sleeping(self)
    }

    fn read_smart_data(&mut self) -> Result<()> {
        SkDisk::read_smart_data(self)
    }

    fn temperature_mkelvin(&mut self) -> Result<u64> {
        SkDisk::temperature_mkelvin(self)
    }
}

pub struct DiskSensorDriver {
    base: SensorBase,
    disk: Box<dyn SmartDisk>,
    dnd: bool,
}

impl DiskSensorDriver {
    /// Open a block device such as `/dev/sda`
    pub fn new(path: &str) -> Result<Self> {
        let disk = SkDisk::open(path)?;
        Ok(Self::with_disk(path, Box::new(disk)))
    }

    pub(crate) fn with_disk(path: impl Into<PathBuf>, disk: Box<dyn SmartDisk>) -> Self {
        let mut base = SensorBase::new(path);
        base.set_num_temps(1);
        Self {
            base,
            disk,
            dnd: false,
        }
    }

    /// Don't wake sleeping disks. They read as 0 until they spin up.
    pub fn set_dnd(&mut self, dnd: bool) {
        self.dnd = dnd;
    }

    pub fn dnd(&self) -> bool {
        self.dnd
    }
}

fn mkelvin_to_celsius(mkelvin: u64) -> Option<i32> {
    let celsius = (mkelvin as f64 - ZERO_CELSIUS_MKELVIN) / 1000.0;
    if celsius < i32::MIN as f64 || celsius > i32::MAX as f64 {
        return None;
    }
    Some(celsius as i32)
}

impl ReadTemps for DiskSensorDriver {
    fn base(&self) -> &SensorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SensorBase {
        &mut self.base
    }

    fn read_temps(&mut self, temps: &mut TemperatureBuffer) -> Result<()> {
        if self.dnd && self.disk.is_sleeping()? {
            temps.push(0);
            return Ok(());
        }

        self.disk.read_smart_data()?;
        let mkelvin = self.disk.temperature_mkelvin()?;
        let celsius = mkelvin_to_celsius(mkelvin).ok_or_else(|| {
            FanhalError::system(format!(
                "{}: Temperature of {} mK is out of range",
                self.base.path().display(),
                mkelvin
            ))
        })?;

        temps.push(self.base.corrected(0, celsius)?);
        Ok(())
    }
}
