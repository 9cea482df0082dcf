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

//! Command Line Interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use fanhal::Level;

#[derive(Parser)]
#[command(name = "fanhal")]
#[command(version)]
#[command(about = "Exercise fanhal sensor and fan drivers")]
#[command(long_about = "Exercise fanhal sensor and fan drivers

Reads the driver description from a JSON file and either prints the
temperatures the configured sensors report or holds the configured fan at a
fixed level. The fan is handed back in its original state on exit.

EXAMPLES:
    fanhal sensors                       One line of temperatures
    fanhal sensors --cycles 0            Keep printing until interrupted
    fanhal fan --level 7 --seconds 30    Hold level 7 for 30 seconds
    fanhal fan --level full-speed

ENVIRONMENT VARIABLES:
    FANHAL_CONFIG=PATH     Driver description (default /etc/fanhal/config.json)
    FANHAL_LOG=debug       Log filter, same syntax as RUST_LOG")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log filter, overrides $FANHAL_LOG
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print one JSON array of temperatures per cycle
    Sensors(SensorsArgs),

    /// Drive the fan at a fixed level (requires root)
    Fan(FanArgs),
}

#[derive(Args)]
pub struct SensorsArgs {
    /// Driver description, overrides $FANHAL_CONFIG
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of cycles, 0 runs until interrupted
    #[arg(long, default_value_t = 1)]
    pub cycles: u64,
}

#[derive(Args)]
pub struct FanArgs {
    /// A number or one of auto, full-speed, disengaged
    #[arg(long)]
    pub level: Level,

    /// Driver description, overrides $FANHAL_CONFIG
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for a signal
    #[arg(long)]
    pub seconds: Option<u64>,
}
