/*
 * Integration tests for fanhal
 *
 * These drive the public API against fake kernel files in a temporary
 * directory, the way a scheduler would: build from a config, run a few
 * cycles, restore.
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fanhal::config::{build_fan, build_sensors, config_path, load_config, CONFIG_ENV};
use fanhal::fan::{HwmonFanDriver, PlatformFanDriver};
use fanhal::sensor::{HwmonSensorDriver, PlatformSensorDriver};
use fanhal::{ErrorKind, FanControl, FanDriver, Level, ReadTemps, SensorDriver, TemperatureBuffer};
use serial_test::serial;
use tempfile::TempDir;

const TP_FAN: &str = "status:\t\tenabled\n\
speed:\t\t3100\n\
level:\t\t2\n\
commands:\tlevel <level> (<level> is 0-7, auto, disengaged, full-speed)\n\
commands:\twatchdog <timeout> (<timeout> is 0 (off), 1-120 (seconds))\n";

struct Machine {
    dir: TempDir,
}

impl Machine {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let m = Self { dir };
        m.put("fan", TP_FAN);
        m.put("thermal", "temperatures:\t45 50 0 -128\n");
        m.put("temp1_input", "61250\n");
        m.put("pwm1", "90\n");
        m.put("pwm1_enable", "5\n");
        m
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn put(&self, name: &str, content: &str) {
        fs::write(self.path(name), content).unwrap();
    }

    fn get(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).unwrap()
    }

    fn config(&self, fan: &str, extra: &str) -> PathBuf {
        let json = format!(
            r#"{{
                "fan": {fan},
                {extra}
                "sensors": [
                    {{ "tp_thermal": "{thermal}", "correction": [0, -5] }},
                    {{ "hwmon": "{hwmon}", "correction": [2] }}
                ]
            }}"#,
            fan = fan,
            extra = extra,
            thermal = self.path("thermal").display(),
            hwmon = self.path("temp1_input").display(),
        );
        let path = self.path("config.json");
        fs::write(&path, json).unwrap();
        path
    }
}

fn read_cycle(sensors: &mut [SensorDriver]) -> fanhal::Result<TemperatureBuffer> {
    let mut temps = TemperatureBuffer::new();
    for sensor in sensors.iter_mut() {
        sensor.read_temps(&mut temps)?;
    }
    Ok(temps)
}

#[test]
fn test_cycle_from_config() {
    let m = Machine::new();
    let fan_spec = format!(r#"{{ "tp_fan": "{}" }}"#, m.path("fan").display());
    let cfg = load_config(&m.config(&fan_spec, r#""watchdog_secs": 30,"#)).unwrap();

    let mut sensors = build_sensors(&cfg).unwrap();
    let temps = read_cycle(&mut sensors).unwrap();
    // thermal: 45, 50-5, 0, -128 (uncorrected tail); hwmon: 61 + 2
    assert_eq!(temps.as_slice(), &[45, 45, 0, -128, 63]);
    assert_eq!(temps.max(), Some(63));

    let mut fan = build_fan(&cfg).unwrap();
    fan.init().unwrap();
    assert_eq!(m.get("fan"), "watchdog 30");

    let level = Level::numeric(7);
    fan.set_speed(&level).unwrap();
    assert_eq!(m.get("fan"), "level 7");
    // Just pinged, depulse off: nothing to do.
    m.put("fan", "untouched");
    fan.ping_watchdog_and_depulse(&level).unwrap();
    assert_eq!(m.get("fan"), "untouched");

    fan.restore().unwrap();
    assert_eq!(m.get("fan"), "level 2");
}

#[test]
fn test_depulse_from_config() {
    let m = Machine::new();
    let fan_spec = format!(r#"{{ "tp_fan": "{}" }}"#, m.path("fan").display());
    let cfg = load_config(&m.config(&fan_spec, r#""depulse_secs": 0.25,"#)).unwrap();

    let mut fan = build_fan(&cfg).unwrap();
    assert_eq!(
        fan.as_platform_mut().unwrap().depulse(),
        Duration::from_millis(250)
    );
    fan.ping_watchdog_and_depulse(&Level::numeric(3)).unwrap();
    // The disengage write was overwritten by the level that followed it.
    assert_eq!(m.get("fan"), "level 3");
    drop(fan);
    assert_eq!(m.get("fan"), "level 2");
}

#[test]
fn test_pwm_fan_from_config() {
    let m = Machine::new();
    let fan_spec = format!(r#"{{ "pwm_fan": "{}" }}"#, m.path("pwm1").display());
    let cfg = load_config(&m.config(&fan_spec, "")).unwrap();

    let mut fan = build_fan(&cfg).unwrap();
    assert!(fan.as_platform_mut().is_none());
    assert_eq!(fan.initial_state(), "5");

    fan.init().unwrap();
    fan.set_speed(&Level::numeric(255)).unwrap();
    assert_eq!(m.get("pwm1_enable"), "1");
    assert_eq!(m.get("pwm1"), "255");

    let err = fan.set_speed(&Level::named("auto")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    drop(fan);
    assert_eq!(m.get("pwm1_enable"), "5");
}

#[test]
fn test_failed_cycle_is_reported() {
    let m = Machine::new();
    let mut sensors: Vec<SensorDriver> = vec![
        HwmonSensorDriver::new(m.path("temp1_input")).unwrap().into(),
        PlatformSensorDriver::new(m.path("thermal")).unwrap().into(),
    ];
    m.put("thermal", "temperatures:\t45\n");

    let mut temps = TemperatureBuffer::new();
    let mut result = Ok(());
    for sensor in sensors.iter_mut() {
        result = result.and_then(|_| sensor.read_temps(&mut temps));
    }
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Io);
    // hwmon plus the one thermal value that was still there
    assert_eq!(temps.as_slice(), &[61, 45]);
}

#[test]
fn test_drivers_reject_bad_paths() {
    let m = Machine::new();

    let err = PlatformFanDriver::new(m.path("missing")).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Io);

    m.put("not_a_fan", "status: enabled\nlevel: auto\n");
    let err = PlatformFanDriver::new(m.path("not_a_fan")).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::System);

    let err = HwmonFanDriver::new(m.path("pwm9")).err().unwrap();
    assert_eq!(err.code(), Some(libc::ENOENT));

    let err = PlatformSensorDriver::new(m.path("temp1_input")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::System);
}

#[test]
fn test_fan_driver_enum_dispatch() {
    let m = Machine::new();
    let mut fans: Vec<FanDriver> = vec![
        PlatformFanDriver::new(m.path("fan")).unwrap().into(),
        HwmonFanDriver::new(m.path("pwm1")).unwrap().into(),
    ];
    let paths: Vec<&Path> = fans.iter().map(|f| f.path()).collect();
    assert_eq!(paths, vec![m.path("fan").as_path(), m.path("pwm1").as_path()]);

    for fan in fans.iter_mut() {
        fan.restore().unwrap();
    }
    assert_eq!(m.get("fan"), "level 2");
    assert_eq!(m.get("pwm1_enable"), "5");
}

#[test]
fn test_invalid_config_rejected() {
    let m = Machine::new();
    let path = m.path("bad.json");
    fs::write(&path, r#"{ "fan": { "tp_fan": "relative/fan" }, "sensors": [] }"#).unwrap();
    assert_eq!(load_config(&path).unwrap_err().kind(), ErrorKind::Config);
}

#[test]
#[serial]
fn test_config_path_env_override() {
    std::env::set_var(CONFIG_ENV, "/run/fanhal/test.json");
    assert_eq!(config_path(), PathBuf::from("/run/fanhal/test.json"));
    std::env::remove_var(CONFIG_ENV);
    assert_eq!(config_path(), PathBuf::from("/etc/fanhal/config.json"));
}
