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
use std::path::Path;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "FANHAL_LOG";

const DEFAULT_LOG_LEVEL: &str = "info";

const JOURNALD_SOCKET: &str = "/run/systemd/journal/socket";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Journald,
    Stderr,
}

/// `--log-level` wins over `$FANHAL_LOG`, which wins over `info`
pub fn resolve_log_level(cli: Option<&str>) -> String {
    cli.map(str::to_string)
        .or_else(|| env::var(LOG_ENV).ok().filter(|s| !s.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|e| {
        eprintln!("Invalid log filter {:?} ({}), using {}", level, e, DEFAULT_LOG_LEVEL);
        EnvFilter::new(DEFAULT_LOG_LEVEL)
    })
}

/// Install the global subscriber. Logs go to the systemd journal when it is
/// reachable, to stderr otherwise. Returns where they went.
pub fn init_logging(level: &str) -> LogTarget {
    if Path::new(JOURNALD_SOCKET).exists() {
        match tracing_journald::layer() {
            Ok(journald) => {
                tracing_subscriber::registry()
                    .with(journald)
                    .with(env_filter(level))
                    .init();
                return LogTarget::Journald;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stderr", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_env_filter(env_filter(level))
        .init();
    LogTarget::Stderr
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_cli_level_wins() {
        env::set_var(LOG_ENV, "warn");
        assert_eq!(resolve_log_level(Some("debug")), "debug");
        env::remove_var(LOG_ENV);
    }

    #[test]
    #[serial]
    fn test_env_level() {
        env::set_var(LOG_ENV, "fanhal=trace");
        assert_eq!(resolve_log_level(None), "fanhal=trace");
        env::remove_var(LOG_ENV);
    }

    #[test]
    #[serial]
    fn test_default_level() {
        env::remove_var(LOG_ENV);
        assert_eq!(resolve_log_level(None), "info");
        env::set_var(LOG_ENV, "  ");
        assert_eq!(resolve_log_level(None), "info");
        env::remove_var(LOG_ENV);
    }

    #[test]
    fn test_bad_filter_falls_back() {
        // Must not panic.
        let _ = env_filter("fanhal=notalevel");
    }
}
