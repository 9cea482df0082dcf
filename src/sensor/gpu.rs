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

//! NVIDIA GPU core temperature via NVML

use fh_error::{FanhalError, Result};
use fh_native::{Nvml, NvmlDevice};
use tracing::{debug, error, warn};

use super::{ReadTemps, SensorBase};
use crate::temps::TemperatureBuffer;

/// One GPU behind a vendor management library
#[cfg_attr(test, mockall::automock)]
pub trait GpuBackend: Send {
    fn device_name(&self) -> Result<String>;

    /// Core temperature in whole degrees Celsius
    fn temperature(&self) -> Result<u32>;

    fn shutdown(&mut self) -> Result<()>;
}

/// An NVML session bound to the device it was opened for
pub struct NvmlGpu {
    nvml: Nvml,
    device: NvmlDevice,
}

impl NvmlGpu {
    pub fn open(bus_id: &str) -> Result<Self> {
        let nvml = Nvml::load()?;
        let device = nvml.device_by_pci_bus_id(bus_id)?;
        Ok(Self { nvml, device })
    }
}

impl GpuBackend for NvmlGpu {
    fn device_name(&self) -> Result<String> {
        self.nvml.device_name(self.device)
    }

    fn temperature(&self) -> Result<u32> {
        self.nvml.temperature(self.device)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.nvml.shutdown()
    }
}

pub struct GpuSensorDriver {
    base: SensorBase,
    backend: Option<Box<dyn GpuBackend>>,
}

impl GpuSensorDriver {
    /// `bus_id` is a PCI bus id such as `0000:01:00.0`
    pub fn new(bus_id: &str) -> Result<Self> {
        let gpu = NvmlGpu::open(bus_id)?;
        Ok(Self::with_backend(bus_id, Box::new(gpu)))
    }

    pub(crate) fn with_backend(bus_id: &str, backend: Box<dyn GpuBackend>) -> Self {
        match backend.device_name() {
            Ok(name) => debug!("{}: Initialized NVML sensor on {}", bus_id, name),
            Err(e) => warn!("{}: Initialized NVML sensor, device name unknown: {}", bus_id, e),
        }

        let mut base = SensorBase::new(bus_id);
        base.set_num_temps(1);
        Self {
            base,
            backend: Some(backend),
        }
    }

    /// End the vendor library session and unload it. Only the first call does
    /// anything; reads afterwards fail.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.backend.take() {
            Some(mut backend) => backend.shutdown(),
            None => Ok(()),
        }
    }
}

impl ReadTemps for GpuSensorDriver {
    fn base(&self) -> &SensorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SensorBase {
        &mut self.base
    }

    fn read_temps(&mut self, temps: &mut TemperatureBuffer) -> Result<()> {
        let backend = self.backend.as_ref().ok_or_else(|| {
            FanhalError::system(format!("{}: NVML has been shut down", self.base.path().display()))
        })?;
        let temp = backend.temperature()?;
        let temp = i32::try_from(temp).map_err(|_| {
            FanhalError::system(format!(
                "{}: GPU temperature {} is out of range",
                self.base.path().display(),
                temp
            ))
        })?;
        temps.push(temp);
        Ok(())
    }
}

impl Drop for GpuSensorDriver {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Failed to shut down NVML driver: {}", e);
        }
    }
}
