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

use serde::Serialize;

/// Temperatures collected during one control cycle, in whole degrees Celsius.
///
/// Sensor drivers only append. Clearing between cycles is up to whoever owns
/// the buffer. After a failed `read_temps` the buffer may hold part of that
/// sensor's readings and the cycle should be discarded.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TemperatureBuffer {
    temps: Vec<i32>,
}

impl TemperatureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            temps: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, temp: i32) {
        self.temps.push(temp);
    }

    pub fn clear(&mut self) {
        self.temps.clear();
    }

    pub fn len(&self) -> usize {
        self.temps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temps.is_empty()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.temps
    }

    /// Hottest reading of the cycle
    pub fn max(&self) -> Option<i32> {
        self.temps.iter().copied().max()
    }
}
