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

//! The sampler entity: one screen region mapped to one stream of MIDI messages.

use serde::{Deserialize, Deserializer, Serialize};

use crate::color::Rgb;
use crate::registry::RegistryError;
use crate::scale::{self, Scale};
use crate::session::Globals;

/// Samplers are identified by a session-unique integer.
pub type SamplerId = u32;

pub const MIN_POLLING_INTERVAL: u32 = 10;
pub const MAX_POLLING_INTERVAL: u32 = 5000;
pub const MAX_NOTE_OFF_DELAY: u32 = 5000;

const DEFAULT_NOTE_NUMBER: u8 = 60;
const DEFAULT_CC_NUMBER: u8 = 1;
const DEFAULT_SCALE_ROOT: u8 = 60;

/// The rectangle of the frame a sampler averages, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Region {
        Region {
            x,
            y,
            width,
            height,
        }
    }

    /// A region must have a positive extent in both directions.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Returns true if the point lies within the region, edges included.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x, y) = (i64::from(x), i64::from(y));
        let (left, top) = (i64::from(self.x), i64::from(self.y));
        x >= left
            && x <= left + i64::from(self.width)
            && y >= top
            && y <= top + i64::from(self.height)
    }
}

/// What the sampled value controls for a note sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteTarget {
    #[default]
    Velocity,
    Note,
}

/// What the sampled value controls for a control change sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CcTarget {
    #[default]
    Value,
    #[serde(rename = "cc")]
    Controller,
}

/// The kind of message a sampler produces, along with the role its value plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "target", rename_all = "snake_case")]
pub enum SamplerKind {
    Note(NoteTarget),
    #[serde(rename = "cc")]
    ControlChange(CcTarget),
    Program,
}

impl Default for SamplerKind {
    fn default() -> Self {
        SamplerKind::Note(NoteTarget::default())
    }
}

impl SamplerKind {
    /// Returns true if the sampled value selects a pitch, in which case scale
    /// quantization applies.
    pub fn has_pitch_role(&self) -> bool {
        matches!(
            self,
            SamplerKind::Note(NoteTarget::Note) | SamplerKind::Program
        )
    }

    /// Returns true if both kinds produce the same message type, regardless of target.
    pub fn same_type(&self, other: &SamplerKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SamplerKind::Note(_) => "note",
            SamplerKind::ControlChange(_) => "cc",
            SamplerKind::Program => "program",
        }
    }
}

/// The inclusive note range quantized values are confined to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRange {
    pub min: u8,
    pub max: u8,
}

impl Default for NoteRange {
    fn default() -> Self {
        NoteRange { min: 0, max: 127 }
    }
}

/// The user-editable settings of a sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    pub channel: u8,
    pub kind: SamplerKind,
    pub note_number: u8,
    pub cc_number: u8,
    pub polling_interval: u32,
    /// Set once the interval has been overridden; such samplers ignore changes to
    /// the global polling interval.
    #[serde(default)]
    pub has_custom_polling_interval: bool,
    pub send_on_change_only: bool,
    pub send_note_off: bool,
    pub note_off_delay: u32,
    #[serde(default)]
    pub linked_sampler_id: Option<SamplerId>,
    pub quantize_to_scale: bool,
    pub scale_root: u8,
    pub scale: Scale,
    pub note_range: NoteRange,
}

impl SamplerConfig {
    /// Creates the default settings for a new sampler in a session with the given globals.
    pub fn from_globals(globals: &Globals) -> SamplerConfig {
        SamplerConfig {
            channel: globals.midi_channel,
            kind: SamplerKind::default(),
            note_number: DEFAULT_NOTE_NUMBER,
            cc_number: DEFAULT_CC_NUMBER,
            polling_interval: globals.polling_interval,
            has_custom_polling_interval: false,
            send_on_change_only: globals.send_on_change_only,
            send_note_off: true,
            note_off_delay: 0,
            linked_sampler_id: None,
            quantize_to_scale: false,
            scale_root: DEFAULT_SCALE_ROOT,
            scale: Scale::default(),
            note_range: NoteRange::default(),
        }
    }

    /// Returns a copy of this config with the update applied. Nothing is applied
    /// if any of the resulting settings is out of range.
    pub fn apply(&self, update: &SamplerUpdate) -> Result<SamplerConfig, RegistryError> {
        let mut config = self.clone();
        if let Some(channel) = update.channel {
            config.channel = channel;
        }
        if let Some(kind) = update.kind {
            config.kind = kind;
        }
        if let Some(note_number) = update.note_number {
            config.note_number = note_number;
        }
        if let Some(cc_number) = update.cc_number {
            config.cc_number = cc_number;
        }
        if let Some(polling_interval) = update.polling_interval {
            config.polling_interval = polling_interval;
            config.has_custom_polling_interval = true;
        }
        if let Some(send_on_change_only) = update.send_on_change_only {
            config.send_on_change_only = send_on_change_only;
        }
        if let Some(send_note_off) = update.send_note_off {
            config.send_note_off = send_note_off;
        }
        if let Some(note_off_delay) = update.note_off_delay {
            config.note_off_delay = note_off_delay;
        }
        if let Some(linked_sampler_id) = update.linked_sampler_id {
            config.linked_sampler_id = linked_sampler_id;
        }
        if let Some(quantize_to_scale) = update.quantize_to_scale {
            config.quantize_to_scale = quantize_to_scale;
        }
        if let Some(scale_root) = update.scale_root {
            config.scale_root = scale_root;
        }
        if let Some(scale) = update.scale {
            config.scale = scale;
        }
        if let Some(note_range) = update.note_range {
            config.note_range = note_range;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks every setting against its allowed range.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if !(1..=16).contains(&self.channel) {
            return Err(RegistryError::InvalidConfig(format!(
                "channel {} is not between 1 and 16",
                self.channel
            )));
        }
        if !(MIN_POLLING_INTERVAL..=MAX_POLLING_INTERVAL).contains(&self.polling_interval) {
            return Err(RegistryError::InvalidConfig(format!(
                "polling interval {}ms is not between {}ms and {}ms",
                self.polling_interval, MIN_POLLING_INTERVAL, MAX_POLLING_INTERVAL
            )));
        }
        if self.note_off_delay > MAX_NOTE_OFF_DELAY {
            return Err(RegistryError::InvalidConfig(format!(
                "note off delay {}ms is above {}ms",
                self.note_off_delay, MAX_NOTE_OFF_DELAY
            )));
        }
        for (name, value) in [
            ("note number", self.note_number),
            ("CC number", self.cc_number),
            ("scale root", self.scale_root),
            ("note range minimum", self.note_range.min),
            ("note range maximum", self.note_range.max),
        ] {
            if value > 127 {
                return Err(RegistryError::InvalidConfig(format!(
                    "{} {} is above 127",
                    name, value
                )));
            }
        }
        if self.note_range.min > self.note_range.max {
            return Err(RegistryError::InvalidConfig(format!(
                "note range {}-{} is inverted",
                self.note_range.min, self.note_range.max
            )));
        }

        Ok(())
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig::from_globals(&Globals::default())
    }
}

/// A partial change to a sampler's settings. Fields left as None are untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SamplerUpdate {
    pub channel: Option<u8>,
    pub kind: Option<SamplerKind>,
    pub note_number: Option<u8>,
    pub cc_number: Option<u8>,
    pub polling_interval: Option<u32>,
    pub send_on_change_only: Option<bool>,
    pub send_note_off: Option<bool>,
    pub note_off_delay: Option<u32>,
    /// Some(None) removes the link.
    #[serde(default, deserialize_with = "deserialize_link")]
    pub linked_sampler_id: Option<Option<SamplerId>>,
    pub quantize_to_scale: Option<bool>,
    #[serde(default, deserialize_with = "scale::deserialize_optional_note")]
    pub scale_root: Option<u8>,
    pub scale: Option<Scale>,
    pub note_range: Option<NoteRange>,
}

/// A present key always counts as an update, an explicit null clears the link.
fn deserialize_link<'de, D>(deserializer: D) -> Result<Option<Option<SamplerId>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<SamplerId>::deserialize(deserializer).map(Some)
}

/// Runtime state, updated by every completed sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplerState {
    /// Clock time of the last completed sample, in milliseconds.
    pub last_sample_time: u64,
    pub color: Rgb,
    pub midi_value: u8,
    /// The last value that made it past change gating.
    pub last_sent_value: Option<u8>,
    /// The last note a note-on was sent for.
    pub last_sent_note: Option<u8>,
    /// Time until the next sample, for display only.
    #[serde(skip)]
    pub display_time_remaining: Option<u64>,
}

impl SamplerState {
    /// Resets the fields that only have meaning within a running session.
    pub fn reset_transient(&mut self) {
        self.last_sample_time = 0;
        self.last_sent_value = None;
        self.last_sent_note = None;
        self.display_time_remaining = None;
    }
}

/// A configured region-to-MIDI rule together with its runtime state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sampler {
    pub id: SamplerId,
    pub region: Region,
    #[serde(flatten)]
    pub config: SamplerConfig,
    #[serde(default)]
    pub state: SamplerState,
}

impl Sampler {
    pub fn new(id: SamplerId, region: Region, config: SamplerConfig) -> Sampler {
        Sampler {
            id,
            region,
            config,
            state: SamplerState::default(),
        }
    }
}
