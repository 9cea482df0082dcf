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

use std::fs;
use std::io;
use std::path::PathBuf;

use fh_error::{FanhalError, Result};

use super::{ReadTemps, SensorBase};
use crate::temps::TemperatureBuffer;

/// A single `tempN_input` file in millidegrees Celsius
#[derive(Debug)]
pub struct HwmonSensorDriver {
    base: SensorBase,
}

impl HwmonSensorDriver {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let mut base = SensorBase::open(path)?;
        base.set_num_temps(1);
        Ok(Self { base })
    }
}

impl ReadTemps for HwmonSensorDriver {
    fn base(&self) -> &SensorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SensorBase {
        &mut self.base
    }

    fn read_temps(&mut self, temps: &mut TemperatureBuffer) -> Result<()> {
        let path = self.base.path();
        let raw = fs::read_to_string(path)
            .map_err(|e| FanhalError::io(format!("Failed to read temperature from {}", path.display()), e))?;
        let millidegrees: i32 = raw.trim().parse().map_err(|_| {
            FanhalError::io(
                format!("Failed to read temperature from {}", path.display()),
                io::Error::new(io::ErrorKind::InvalidData, format!("not a number: {:?}", raw.trim())),
            )
        })?;

        temps.push(self.base.corrected(0, millidegrees / 1000)?);
        Ok(())
    }
}
