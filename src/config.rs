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

//! Run configuration and engine setup.

use std::sync::Arc;

use tracing::info;

use crate::engine::Engine;
use crate::midi;
use crate::preset::PresetStore;
use crate::scheduler::{Clock, Scheduler};
use crate::session::Session;

pub mod error;
mod run;

pub use error::ConfigError;
pub use run::{FrameSize, RunConfig, SamplerDefinition};

/// Builds an engine from the configuration: opens the MIDI output, loads the
/// configured preset and then adds the inline samplers.
pub fn init_engine(config: &RunConfig, clock: Arc<dyn Clock>) -> Result<Engine, ConfigError> {
    config.globals().validate()?;
    let frame = config.frame();
    if frame.width == 0 || frame.height == 0 {
        return Err(ConfigError::InvalidFrame {
            width: frame.width,
            height: frame.height,
        });
    }

    let mut session = Session::new(*config.globals());
    match config.midi_device() {
        Some(name) => {
            let device = midi::get_device(name).map_err(|e| ConfigError::Device {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
            session.set_output(Some(device));
        }
        None => info!("No MIDI device configured, nothing will be sent."),
    }

    let mut engine = Engine::new(session, Scheduler::new(clock, config.tick()?));

    if let Some(name) = config.preset() {
        let path = config
            .presets()
            .ok_or_else(|| ConfigError::NoPresetsFile(name.to_string()))?;
        let store = PresetStore::load(path)?;
        engine.load_preset(store.get(name)?)?;
        info!(preset = name, "Loaded preset from config.");
    }

    for definition in config.samplers() {
        engine.add_sampler(definition.region, &definition.settings)?;
    }

    info!(
        samplers = engine.registry().len(),
        tick = ?engine.scheduler().period(),
        "Engine initialized."
    );
    Ok(engine)
}
