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

//! Access to kernel control files
//!
//! Fan drivers never touch `std::fs` directly; they go through [`SysfsIo`] so
//! that errno-level failures (EINVAL after resume, EPERM without
//! `fan_control=1`) can be reproduced in tests.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Read and write whole control files. Each call opens and closes the file.
#[cfg_attr(test, mockall::automock)]
pub trait SysfsIo: Send {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write `contents` and flush. Must not create the file.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
}

/// The real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct Sysfs;

impl SysfsIo for Sysfs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let mut f = OpenOptions::new().write(true).truncate(true).open(path)?;
        f.write_all(contents.as_bytes())?;
        f.flush()
    }
}
