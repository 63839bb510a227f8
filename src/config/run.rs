// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::sampler::{Region, SamplerUpdate};
use crate::scheduler::DEFAULT_TICK;
use crate::session::Globals;

/// The size of the frames fed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl Default for FrameSize {
    fn default() -> Self {
        FrameSize {
            width: 640,
            height: 360,
        }
    }
}

/// A sampler to create at startup: its region plus any settings that differ
/// from the globals.
#[derive(Debug, Clone, Deserialize)]
pub struct SamplerDefinition {
    pub region: Region,
    #[serde(flatten)]
    pub settings: SamplerUpdate,
}

/// The configuration for a run of the engine.
#[derive(Debug, Deserialize)]
pub struct RunConfig {
    /// The MIDI output. Without one, samplers still sample but send nothing.
    midi_device: Option<String>,
    /// A MIDI input whose events are traced while running.
    midi_input: Option<String>,
    /// The base tick, as a duration string.
    tick: Option<String>,
    #[serde(default)]
    frame: FrameSize,
    #[serde(default)]
    globals: Globals,
    /// The presets file.
    presets: Option<PathBuf>,
    /// A preset to load before the inline samplers are added.
    preset: Option<String>,
    #[serde(default)]
    samplers: Vec<SamplerDefinition>,
}

impl RunConfig {
    /// Parses a run configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<RunConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<RunConfig>()?)
    }

    pub fn midi_device(&self) -> Option<&str> {
        self.midi_device.as_deref()
    }

    pub fn midi_input(&self) -> Option<&str> {
        self.midi_input.as_deref()
    }

    /// Returns the base tick (default: 10ms).
    pub fn tick(&self) -> Result<Duration, ConfigError> {
        let Some(tick) = &self.tick else {
            return Ok(DEFAULT_TICK);
        };

        let invalid = |reason: String| ConfigError::InvalidTick {
            tick: tick.clone(),
            reason,
        };
        let duration: Duration = DurationString::from_string(tick.clone())
            .map_err(|e| invalid(e.to_string()))?
            .into();
        if duration.is_zero() {
            return Err(invalid("tick must be positive".to_string()));
        }
        Ok(duration)
    }

    pub fn frame(&self) -> FrameSize {
        self.frame
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn presets(&self) -> Option<&Path> {
        self.presets.as_deref()
    }

    pub fn preset(&self) -> Option<&str> {
        self.preset.as_deref()
    }

    pub fn samplers(&self) -> &[SamplerDefinition] {
        &self.samplers
    }
}
