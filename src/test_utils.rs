/*
 * Test utilities for fanhal
 *
 * Fixtures for the kernel files the drivers read and write, backed by
 * temporary files.
 */

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// `/proc/acpi/ibm/fan` of a ThinkPad with fan_control=1, fan in auto mode
pub const TP_FAN_AUTO: &str = "status:\t\tenabled\n\
speed:\t\t2890\n\
level:\t\tauto\n\
commands:\tlevel <level> (<level> is 0-7, auto, disengaged, full-speed)\n\
commands:\tenable, disable\n\
commands:\twatchdog <timeout> (<timeout> is 0 (off), 1-120 (seconds))\n";

/// `/proc/acpi/ibm/thermal` with eight sensors, one of them absent (-128)
pub const TP_THERMAL: &str = "temperatures:\t52 0 48 0 38 -128 32 0\n";

/// A single file in its own temporary directory
pub struct SensorFixture {
    dir: TempDir,
    path: PathBuf,
}

impl SensorFixture {
    pub fn new(name: &str, content: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create another file next to this one
    pub fn sibling(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// Replace the contents, as the kernel would between reads
    pub fn write(&self, content: &str) {
        fs::write(&self.path, content).unwrap();
    }

    pub fn read(&self) -> String {
        fs::read_to_string(&self.path).unwrap()
    }

    pub fn remove(&self) {
        fs::remove_file(&self.path).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_lifecycle() {
        let fixture = SensorFixture::new("temp1_input", "45000");
        assert_eq!(fixture.read(), "45000");

        fixture.write("46000");
        assert_eq!(fixture.read(), "46000");

        let sibling = fixture.sibling("temp2_input", "1");
        assert_eq!(sibling.parent(), fixture.path().parent());

        fixture.remove();
        assert!(!fixture.path().exists());
    }

    #[test]
    fn test_fan_fixture_has_level_command() {
        assert!(TP_FAN_AUTO
            .lines()
            .any(|l| l.contains("commands:") && l.contains("level <level>")));
    }
}
