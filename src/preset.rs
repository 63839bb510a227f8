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

//! Named snapshots of the sampler set and the global defaults, stored as a
//! single YAML file.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::registry::RegistryError;
use crate::sampler::Sampler;
use crate::session::Globals;

#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("unable to access preset file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("unable to parse presets: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("preset is invalid: {0}")]
    Registry(#[from] RegistryError),

    #[error("no preset named {0}")]
    NotFound(String),
}

/// A saved sampler set. Runtime fields are reset on capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub samplers: Vec<Sampler>,
    #[serde(default = "default_polling_interval")]
    pub global_polling_interval: u32,
    #[serde(default = "default_delta_threshold")]
    pub global_delta_threshold: u8,
    #[serde(default)]
    pub global_send_on_change_only: bool,
    #[serde(default = "default_midi_channel")]
    pub global_midi_channel: u8,
}

fn default_polling_interval() -> u32 {
    Globals::default().polling_interval
}

fn default_delta_threshold() -> u8 {
    Globals::default().delta_threshold
}

fn default_midi_channel() -> u8 {
    Globals::default().midi_channel
}

impl Preset {
    /// Captures the given samplers and globals.
    pub fn capture(samplers: &[Sampler], globals: &Globals) -> Preset {
        let samplers = samplers
            .iter()
            .cloned()
            .map(|mut sampler| {
                sampler.state.reset_transient();
                sampler
            })
            .collect();
        Preset {
            samplers,
            global_polling_interval: globals.polling_interval,
            global_delta_threshold: globals.delta_threshold,
            global_send_on_change_only: globals.send_on_change_only,
            global_midi_channel: globals.midi_channel,
        }
    }

    pub fn globals(&self) -> Globals {
        Globals {
            polling_interval: self.global_polling_interval,
            delta_threshold: self.global_delta_threshold,
            send_on_change_only: self.global_send_on_change_only,
            midi_channel: self.global_midi_channel,
        }
    }
}

/// The presets stored in one file, by name.
pub struct PresetStore {
    path: PathBuf,
    presets: BTreeMap<String, Preset>,
}

impl PresetStore {
    /// Loads the store from the given path. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<PresetStore, PresetError> {
        let presets = match fs::read_to_string(path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_yml::from_str(&contents)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(PresetError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        Ok(PresetStore {
            path: path.to_path_buf(),
            presets,
        })
    }

    /// Writes every preset back to the store's file.
    pub fn save(&self) -> Result<(), PresetError> {
        let contents = serde_yml::to_string(&self.presets)?;
        fs::write(&self.path, contents).map_err(|e| PresetError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        info!(
            path = self.path.display().to_string(),
            presets = self.presets.len(),
            "Saved presets."
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Result<&Preset, PresetError> {
        self.presets
            .get(name)
            .ok_or_else(|| PresetError::NotFound(name.to_string()))
    }

    /// Adds or replaces a preset.
    pub fn insert(&mut self, name: &str, preset: Preset) {
        self.presets.insert(name.to_string(), preset);
    }

    /// Removes a preset and writes the store back to its file. Nothing is
    /// written if there is no preset with that name.
    pub fn delete(&mut self, name: &str) -> Result<Preset, PresetError> {
        let preset = self
            .presets
            .remove(name)
            .ok_or_else(|| PresetError::NotFound(name.to_string()))?;
        self.save()?;
        info!(preset = name, "Deleted preset.");
        Ok(preset)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;
    use crate::color::Rgb;
    use crate::sampler::{NoteTarget, Region, SamplerConfig, SamplerKind};
    use crate::scale::Scale;

    fn sampler(id: u32) -> Sampler {
        let mut config = SamplerConfig::default();
        config.kind = SamplerKind::Note(NoteTarget::Note);
        config.quantize_to_scale = true;
        config.scale = Scale::Dorian;
        let mut sampler = Sampler::new(id, Region::new(id as i32, 0, 10, 10), config);
        sampler.state.last_sample_time = 12345;
        sampler.state.color = Rgb::new(10, 20, 30);
        sampler.state.midi_value = 9;
        sampler.state.last_sent_value = Some(9);
        sampler.state.last_sent_note = Some(62);
        sampler.state.display_time_remaining = Some(30);
        sampler
    }

    #[test]
    fn test_capture_resets_transient_fields() {
        let globals = Globals {
            polling_interval: 80,
            delta_threshold: 3,
            send_on_change_only: true,
            midi_channel: 4,
        };
        let preset = Preset::capture(&[sampler(1), sampler(4)], &globals);

        assert_eq!(globals, preset.globals());
        assert_eq!(2, preset.samplers.len());
        let captured = &preset.samplers[1];
        assert_eq!(4, captured.id);
        assert_eq!(0, captured.state.last_sample_time);
        assert_eq!(None, captured.state.last_sent_value);
        assert_eq!(None, captured.state.last_sent_note);
        assert_eq!(None, captured.state.display_time_remaining);
        // Cached values are kept.
        assert_eq!(Rgb::new(10, 20, 30), captured.state.color);
        assert_eq!(9, captured.state.midi_value);
        assert_eq!(sampler(4).config, captured.config);
    }

    #[test]
    fn test_round_trip() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("presets.yaml");

        let mut store = PresetStore::load(&path)?;
        assert!(store.is_empty());

        let preset = Preset::capture(&[sampler(2), sampler(7)], &Globals::default());
        store.insert("verse", preset.clone());
        store.save()?;

        let store = PresetStore::load(&path)?;
        assert_eq!(vec!["verse"], store.names().collect::<Vec<_>>());
        assert_eq!(&preset, store.get("verse")?);
        assert!(matches!(
            store.get("chorus"),
            Err(PresetError::NotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_delete() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("presets.yaml");

        let mut store = PresetStore::load(&path)?;
        store.insert("verse", Preset::capture(&[sampler(1)], &Globals::default()));
        store.insert("chorus", Preset::capture(&[sampler(2)], &Globals::default()));
        store.save()?;

        let mut store = PresetStore::load(&path)?;
        let deleted = store.delete("verse")?;
        assert_eq!(1, deleted.samplers[0].id);
        assert!(matches!(
            store.delete("bridge"),
            Err(PresetError::NotFound(name)) if name == "bridge"
        ));

        let store = PresetStore::load(&path)?;
        assert_eq!(vec!["chorus"], store.names().collect::<Vec<_>>());
        assert!(matches!(store.get("verse"), Err(PresetError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_parse_defaults() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("presets.yaml");
        fs::write(
            &path,
            r#"
empty: {}
single:
  global_midi_channel: 2
  samplers:
  - id: 3
    region: {x: 1, y: 2, width: 3, height: 4}
    channel: 2
    kind: {type: program}
    note_number: 60
    cc_number: 1
    polling_interval: 100
    send_on_change_only: false
    send_note_off: true
    note_off_delay: 0
    quantize_to_scale: true
    scale_root: 62
    scale: blues
    note_range: {min: 40, max: 80}
"#,
        )?;

        let store = PresetStore::load(&path)?;
        assert_eq!(2, store.len());
        assert_eq!(Globals::default(), store.get("empty")?.globals());

        let single = store.get("single")?;
        assert_eq!(2, single.global_midi_channel);
        assert_eq!(50, single.global_polling_interval);
        let sampler = &single.samplers[0];
        assert_eq!(SamplerKind::Program, sampler.config.kind);
        assert_eq!(Scale::Blues, sampler.config.scale);
        assert_eq!(None, sampler.config.linked_sampler_id);
        assert_eq!(None, sampler.state.last_sent_value);
        Ok(())
    }

    #[test]
    fn test_unparseable_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("presets.yaml");
        fs::write(&path, "- not\n- a map\n")?;
        assert!(matches!(
            PresetStore::load(&path),
            Err(PresetError::Parse(_))
        ));
        Ok(())
    }
}
