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

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fh_error::{FanhalError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fan::{FanDriver, HwmonFanDriver, PlatformFanDriver};
use crate::sensor::{HwmonSensorDriver, PlatformSensorDriver, ReadTemps, SensorDriver};

pub const CONFIG_ENV: &str = "FANHAL_CONFIG";

/// Upper bound thinkpad_acpi accepts for `watchdog <seconds>`
pub const MAX_WATCHDOG_SECS: u64 = 120;

pub const MAX_DEPULSE_SECS: f64 = 10.0;

/// A longer sleep would let the fan watchdog lapse between cycles
pub const MAX_POLL_INTERVAL_SECS: u64 = MAX_WATCHDOG_SECS;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FanSpec {
    TpFan(PathBuf),
    PwmFan(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Hwmon(PathBuf),
    TpThermal(PathBuf),
    /// Block device, e.g. `/dev/sda`
    Atasmart(String),
    /// PCI bus id, e.g. `0000:01:00.0`
    Nvml(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SensorSpec {
    #[serde(flatten)]
    pub kind: SensorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<Vec<i32>>,
}

fn default_watchdog_secs() -> u64 { 120 }
fn default_poll_interval_secs() -> u64 { 5 }

/// Which drivers to build and how to set them up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    pub fan: FanSpec,
    #[serde(default = "default_watchdog_secs")]
    pub watchdog_secs: u64,
    /// 0 disables depulsing
    #[serde(default)]
    pub depulse_secs: f64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Don't wake sleeping disks to read their temperature
    #[serde(default)]
    pub dnd_disk: bool,
    pub sensors: Vec<SensorSpec>,
}

impl DriverConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn watchdog(&self) -> Duration {
        Duration::from_secs(self.watchdog_secs)
    }

    /// Only meaningful after [`validate_config`] accepted the value
    pub fn depulse(&self) -> Duration {
        Duration::from_secs_f64(self.depulse_secs)
    }
}

pub fn config_path() -> PathBuf {
    match env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from("/etc/fanhal/config.json"),
    }
}

fn check_path(what: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() || !path.is_absolute() {
        return Err(FanhalError::config(format!(
            "{} path must be absolute, got {:?}",
            what,
            path.display()
        )));
    }
    Ok(())
}

pub fn validate_config(cfg: &DriverConfig) -> Result<()> {
    match &cfg.fan {
        FanSpec::TpFan(path) => check_path("tp_fan", path)?,
        FanSpec::PwmFan(path) => check_path("pwm_fan", path)?,
    }

    if cfg.watchdog_secs == 0 || cfg.watchdog_secs > MAX_WATCHDOG_SECS {
        return Err(FanhalError::config(format!(
            "watchdog_secs must be within 1..={}",
            MAX_WATCHDOG_SECS
        )));
    }
    if !cfg.depulse_secs.is_finite() || !(0.0..=MAX_DEPULSE_SECS).contains(&cfg.depulse_secs) {
        return Err(FanhalError::config(format!(
            "depulse_secs must be within 0..={}",
            MAX_DEPULSE_SECS
        )));
    }
    if cfg.poll_interval_secs == 0 || cfg.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
        return Err(FanhalError::config(format!(
            "poll_interval_secs must be within 1..={}",
            MAX_POLL_INTERVAL_SECS
        )));
    }

    if cfg.sensors.is_empty() {
        return Err(FanhalError::config("at least one sensor is required"));
    }
    for (i, sensor) in cfg.sensors.iter().enumerate() {
        match &sensor.kind {
            SensorKind::Hwmon(path) => check_path("hwmon", path)?,
            SensorKind::TpThermal(path) => check_path("tp_thermal", path)?,
            SensorKind::Atasmart(dev) => check_path("atasmart", Path::new(dev))?,
            SensorKind::Nvml(bus_id) => {
                if bus_id.trim().is_empty() {
                    return Err(FanhalError::config(format!("sensor #{} has an empty PCI bus id", i + 1)));
                }
            }
        }
    }
    Ok(())
}

pub fn load_config(path: &Path) -> Result<DriverConfig> {
    let data = fs::read_to_string(path)
        .map_err(|e| FanhalError::io(format!("Failed to read config {}", path.display()), e))?;
    let cfg: DriverConfig = serde_json::from_str(&data)?;
    validate_config(&cfg)?;
    debug!("Loaded {} with {} sensor(s)", path.display(), cfg.sensors.len());
    Ok(cfg)
}

pub fn build_fan(cfg: &DriverConfig) -> Result<FanDriver> {
    match &cfg.fan {
        FanSpec::TpFan(path) => {
            let mut fan = PlatformFanDriver::new(path)?;
            fan.set_watchdog(cfg.watchdog());
            fan.set_depulse(cfg.depulse());
            fan.set_poll_interval(cfg.poll_interval());
            Ok(fan.into())
        }
        FanSpec::PwmFan(path) => {
            if cfg.depulse_secs > 0.0 {
                warn!("depulse_secs only applies to tp_fan, ignoring it for {}", path.display());
            }
            Ok(HwmonFanDriver::new(path)?.into())
        }
    }
}

#[cfg_attr(not(feature = "atasmart"), allow(unused_variables))]
fn build_sensor(cfg: &DriverConfig, spec: &SensorSpec) -> Result<SensorDriver> {
    let mut sensor: SensorDriver = match &spec.kind {
        SensorKind::Hwmon(path) => HwmonSensorDriver::new(path)?.into(),
        SensorKind::TpThermal(path) => PlatformSensorDriver::new(path)?.into(),
        #[cfg(feature = "atasmart")]
        SensorKind::Atasmart(dev) => {
            let mut disk = crate::sensor::DiskSensorDriver::new(dev)?;
            disk.set_dnd(cfg.dnd_disk);
            disk.into()
        }
        #[cfg(not(feature = "atasmart"))]
        SensorKind::Atasmart(dev) => {
            return Err(FanhalError::config(format!(
                "{}: fanhal was built without atasmart support",
                dev
            )))
        }
        #[cfg(feature = "nvml")]
        SensorKind::Nvml(bus_id) => crate::sensor::GpuSensorDriver::new(bus_id)?.into(),
        #[cfg(not(feature = "nvml"))]
        SensorKind::Nvml(bus_id) => {
            return Err(FanhalError::config(format!(
                "{}: fanhal was built without NVML support",
                bus_id
            )))
        }
    };

    if let Some(correction) = &spec.correction {
        sensor.set_correction(correction.clone())?;
    }
    Ok(sensor)
}

/// Build every configured sensor in order. The first failure aborts.
pub fn build_sensors(cfg: &DriverConfig) -> Result<Vec<SensorDriver>> {
    cfg.sensors.iter().map(|spec| build_sensor(cfg, spec)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fan::FanControl;
    use crate::temps::TemperatureBuffer;
    use crate::test_utils::{SensorFixture, TP_FAN_AUTO};
    use fh_error::ErrorKind;
    use serial_test::serial;

    fn minimal() -> DriverConfig {
        serde_json::from_str(
            r#"{
                "fan": { "tp_fan": "/proc/acpi/ibm/fan" },
                "sensors": [ { "hwmon": "/sys/class/hwmon/hwmon0/temp1_input" } ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = minimal();
        assert_eq!(cfg.watchdog(), Duration::from_secs(120));
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
        assert!(cfg.depulse().is_zero());
        assert!(!cfg.dnd_disk);
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn test_sensor_kinds_and_corrections() {
        let cfg: DriverConfig = serde_json::from_str(
            r#"{
                "fan": { "pwm_fan": "/sys/class/hwmon/hwmon2/pwm1" },
                "depulse_secs": 0.5,
                "sensors": [
                    { "hwmon": "/sys/class/hwmon/hwmon0/temp1_input", "correction": [2] },
                    { "tp_thermal": "/proc/acpi/ibm/thermal", "correction": [0, -3] },
                    { "atasmart": "/dev/sda" },
                    { "nvml": "0000:01:00.0" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.fan, FanSpec::PwmFan(PathBuf::from("/sys/class/hwmon/hwmon2/pwm1")));
        assert_eq!(cfg.depulse(), Duration::from_millis(500));
        assert_eq!(cfg.sensors[0].correction, Some(vec![2]));
        assert_eq!(cfg.sensors[1].kind, SensorKind::TpThermal(PathBuf::from("/proc/acpi/ibm/thermal")));
        assert_eq!(cfg.sensors[2].kind, SensorKind::Atasmart("/dev/sda".to_string()));
        assert_eq!(cfg.sensors[3].correction, None);
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn test_unknown_top_level_field_rejected() {
        let res: std::result::Result<DriverConfig, _> = serde_json::from_str(
            r#"{ "fan": { "tp_fan": "/proc/acpi/ibm/fan" }, "sensors": [], "curves": [] }"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_validate_rejects() {
        let mut cfg = minimal();
        cfg.sensors.clear();
        assert_eq!(validate_config(&cfg).unwrap_err().kind(), ErrorKind::Config);

        let mut cfg = minimal();
        cfg.fan = FanSpec::TpFan(PathBuf::from("proc/acpi/ibm/fan"));
        assert!(validate_config(&cfg).is_err());

        let mut cfg = minimal();
        cfg.depulse_secs = f64::NAN;
        assert!(validate_config(&cfg).is_err());

        let mut cfg = minimal();
        cfg.depulse_secs = 11.0;
        assert!(validate_config(&cfg).is_err());

        let mut cfg = minimal();
        cfg.poll_interval_secs = 0;
        assert!(validate_config(&cfg).is_err());
        cfg.poll_interval_secs = 121;
        assert!(validate_config(&cfg).is_err());
        cfg.poll_interval_secs = 120;
        assert!(validate_config(&cfg).is_ok());

        let mut cfg = minimal();
        cfg.watchdog_secs = 0;
        assert!(validate_config(&cfg).is_err());
        cfg.watchdog_secs = 121;
        assert!(validate_config(&cfg).is_err());

        let mut cfg = minimal();
        cfg.sensors.push(SensorSpec { kind: SensorKind::Nvml(" ".to_string()), correction: None });
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    #[serial]
    fn test_config_path_from_env() {
        env::set_var(CONFIG_ENV, "/tmp/fanhal-test.json");
        assert_eq!(config_path(), PathBuf::from("/tmp/fanhal-test.json"));
        env::remove_var(CONFIG_ENV);
    }

    #[test]
    #[serial]
    fn test_config_path_fallback() {
        env::remove_var(CONFIG_ENV);
        assert_eq!(config_path(), PathBuf::from("/etc/fanhal/config.json"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/fanhal.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_load_config_parse_error() {
        let fixture = SensorFixture::new("config.json", "{ not json");
        let err = load_config(fixture.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_load_config_rejects_huge_poll_interval() {
        let fixture = SensorFixture::new(
            "config.json",
            r#"{
                "fan": { "tp_fan": "/proc/acpi/ibm/fan" },
                "poll_interval_secs": 18446744073709551615,
                "sensors": [ { "hwmon": "/sys/class/hwmon/hwmon0/temp1_input" } ]
            }"#,
        );
        let err = load_config(fixture.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn test_build_drivers_from_files() {
        let fan = SensorFixture::new("fan", TP_FAN_AUTO);
        let thermal = fan.sibling("thermal", "temperatures:\t50 40 30\n");
        let cfg = DriverConfig {
            fan: FanSpec::TpFan(fan.path().to_path_buf()),
            watchdog_secs: 60,
            depulse_secs: 0.0,
            poll_interval_secs: 3,
            dnd_disk: false,
            sensors: vec![SensorSpec {
                kind: SensorKind::TpThermal(thermal),
                correction: Some(vec![-10, 0, 10]),
            }],
        };

        let mut sensors = build_sensors(&cfg).unwrap();
        assert_eq!(sensors.len(), 1);
        let mut temps = TemperatureBuffer::new();
        sensors[0].read_temps(&mut temps).unwrap();
        assert_eq!(temps.as_slice(), &[40, 40, 40]);

        let mut driver = build_fan(&cfg).unwrap();
        assert_eq!(driver.initial_state(), "auto");
        assert_eq!(driver.as_platform_mut().unwrap().watchdog(), Duration::from_secs(60));
        driver.init().unwrap();
        assert_eq!(fan.read(), "watchdog 60");
        driver.restore().unwrap();
        assert_eq!(fan.read(), "level auto");
    }

    #[test]
    fn test_build_rejects_oversized_correction() {
        let sensor = SensorFixture::new("temp1_input", "42000");
        let mut cfg = minimal();
        cfg.sensors = vec![SensorSpec {
            kind: SensorKind::Hwmon(sensor.path().to_path_buf()),
            correction: Some(vec![1, 2]),
        }];
        let err = build_sensors(&cfg).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
