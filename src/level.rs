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

use std::fmt;
use std::str::FromStr;

use fh_error::FanhalError;

/// Named levels understood by thinkpad_acpi
pub const NAMED_LEVELS: &[&str] = &["auto", "full-speed", "disengaged"];

/// Target fan speed handed to a fan driver.
///
/// The platform fan writes the text form (`level 4`, `level auto`), the
/// hwmon fan writes the number. Named levels have no number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    text: String,
    num: Option<u32>,
}

impl Level {
    pub fn numeric(num: u32) -> Self {
        Self {
            text: format!("level {}", num),
            num: Some(num),
        }
    }

    /// A named level such as `auto`. A leading `level ` is accepted and not
    /// duplicated.
    pub fn named(name: &str) -> Self {
        let name = name.strip_prefix("level ").unwrap_or(name).trim();
        Self {
            text: format!("level {}", name),
            num: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn num(&self) -> Option<u32> {
        self.num
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Level {
    type Err = FanhalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bare = s.strip_prefix("level").map(str::trim_start).unwrap_or(s);
        if let Ok(num) = bare.parse::<u32>() {
            return Ok(Self::numeric(num));
        }
        if NAMED_LEVELS.contains(&bare) {
            return Ok(Self::named(bare));
        }
        Err(FanhalError::config(format!(
            "unknown fan level {:?} (expected a number or one of {})",
            s,
            NAMED_LEVELS.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_level() {
        let level = Level::numeric(4);
        assert_eq!(level.as_str(), "level 4");
        assert_eq!(level.num(), Some(4));
    }

    #[test]
    fn test_named_level() {
        assert_eq!(Level::named("auto").as_str(), "level auto");
        assert_eq!(Level::named("level full-speed").as_str(), "level full-speed");
        assert_eq!(Level::named("auto").num(), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("7".parse::<Level>().unwrap(), Level::numeric(7));
        assert_eq!("level 2".parse::<Level>().unwrap(), Level::numeric(2));
        assert_eq!("disengaged".parse::<Level>().unwrap(), Level::named("disengaged"));
        assert_eq!(" level auto ".parse::<Level>().unwrap(), Level::named("auto"));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "turbo".parse::<Level>().unwrap_err();
        assert_eq!(err.kind(), fh_error::ErrorKind::Config);
        assert!("-3".parse::<Level>().is_err());
    }
}
