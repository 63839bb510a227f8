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

use crate::preset::PresetError;
use crate::registry::RegistryError;

/// Errors from loading a run configuration and building an engine from it.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid tick {tick}: {reason}")]
    InvalidTick { tick: String, reason: String },

    #[error("invalid frame size {width}x{height}")]
    InvalidFrame { width: u32, height: u32 },

    #[error("unable to open MIDI device {name}: {reason}")]
    Device { name: String, reason: String },

    #[error("preset {0} was requested but no presets file is configured")]
    NoPresetsFile(String),

    #[error(transparent)]
    Preset(#[from] PresetError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
