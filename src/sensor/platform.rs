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

//! thinkpad_acpi thermal file (`/proc/acpi/ibm/thermal`)
//!
//! ```text
//! temperatures:   52 0 0 0 38 0 32 0 0 0 0 0 0 0 0 0
//! ```
//!
//! Whole degrees Celsius. The number of fields depends on the model and is
//! counted once at construction.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

use fh_error::{FanhalError, Result};
use tracing::debug;

use super::{ReadTemps, SensorBase};
use crate::temps::TemperatureBuffer;

const HEADER: &str = "temperatures:";

#[derive(Debug)]
pub struct PlatformSensorDriver {
    base: SensorBase,
    skip_bytes: u64,
}

impl PlatformSensorDriver {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let mut base = SensorBase::open(path)?;
        let content = read_from(&base, 0)?;

        let fields = content.strip_prefix(HEADER).ok_or_else(|| {
            FanhalError::system(format!(
                "{}: Unknown file format, expected it to start with \"{}\"",
                base.path().display(),
                HEADER
            ))
        })?;

        let count = fields
            .split_whitespace()
            .take_while(|field| field.parse::<i32>().is_ok())
            .count();
        // A sensor with nothing to read would shift every later reading
        // out of place without anyone noticing.
        if count == 0 {
            return Err(FanhalError::system(format!(
                "{}: No temperatures found",
                base.path().display()
            )));
        }
        debug!("{}: {} temperatures", base.path().display(), count);

        base.set_num_temps(count);
        Ok(Self {
            base,
            skip_bytes: HEADER.len() as u64,
        })
    }
}

/// Everything in the sensor file from `offset` on
fn read_from(base: &SensorBase, offset: u64) -> Result<String> {
    let path = base.path();
    let context = || format!("Failed to read temperatures from {}", path.display());

    let mut file = File::open(path).map_err(|e| FanhalError::io(context(), e))?;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| FanhalError::io(context(), e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| FanhalError::io(context(), e))?;
    Ok(content)
}

impl ReadTemps for PlatformSensorDriver {
    fn base(&self) -> &SensorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SensorBase {
        &mut self.base
    }

    fn read_temps(&mut self, temps: &mut TemperatureBuffer) -> Result<()> {
        let content = read_from(&self.base, self.skip_bytes)?;
        let mut fields = content.split_whitespace();

        for idx in 0..self.base.num_temps() {
            let value = fields.next().and_then(|field| field.parse::<i32>().ok());
            match value {
                Some(temp) => temps.push(self.base.corrected(idx, temp)?),
                None => {
                    return Err(FanhalError::io(
                        format!("Failed to read temperatures from {}", self.base.path().display()),
                        io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("expected {} values, got {}", self.base.num_temps(), idx),
                        ),
                    ))
                }
            }
        }
        Ok(())
    }
}
