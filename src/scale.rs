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

//! Musical scales and pitch quantization.

use std::fmt;

use serde::{de, Deserialize, Deserializer};

use crate::sampler::NoteRange;

/// Note names within an octave, starting at C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// The scales a sampler can be quantized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scale {
    Chromatic,
    #[default]
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    HarmonicMinor,
    MelodicMinor,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
    WholeTone,
}

impl Scale {
    /// Every known scale, in table order.
    pub const ALL: [Scale; 14] = [
        Scale::Chromatic,
        Scale::Major,
        Scale::Minor,
        Scale::Dorian,
        Scale::Phrygian,
        Scale::Lydian,
        Scale::Mixolydian,
        Scale::Locrian,
        Scale::HarmonicMinor,
        Scale::MelodicMinor,
        Scale::PentatonicMajor,
        Scale::PentatonicMinor,
        Scale::Blues,
        Scale::WholeTone,
    ];

    /// Semitone offsets from the root, ascending. Always starts with 0.
    pub fn intervals(&self) -> &'static [i32] {
        match self {
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Scale::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Scale::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Scale::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Scale::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
            Scale::PentatonicMajor => &[0, 2, 4, 7, 9],
            Scale::PentatonicMinor => &[0, 3, 5, 7, 10],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
            Scale::WholeTone => &[0, 2, 4, 6, 8, 10],
        }
    }

    /// The configuration name of the scale.
    pub fn name(&self) -> &'static str {
        match self {
            Scale::Chromatic => "chromatic",
            Scale::Major => "major",
            Scale::Minor => "minor",
            Scale::Dorian => "dorian",
            Scale::Phrygian => "phrygian",
            Scale::Lydian => "lydian",
            Scale::Mixolydian => "mixolydian",
            Scale::Locrian => "locrian",
            Scale::HarmonicMinor => "harmonic-minor",
            Scale::MelodicMinor => "melodic-minor",
            Scale::PentatonicMajor => "pentatonic-major",
            Scale::PentatonicMinor => "pentatonic-minor",
            Scale::Blues => "blues",
            Scale::WholeTone => "whole-tone",
        }
    }

    /// Looks up a scale by its configuration name.
    pub fn from_name(name: &str) -> Option<Scale> {
        Scale::ALL.into_iter().find(|scale| scale.name() == name)
    }
}

/// Unknown scale names fall back to chromatic.
impl From<String> for Scale {
    fn from(name: String) -> Self {
        Scale::from_name(&name).unwrap_or(Scale::Chromatic)
    }
}

impl From<Scale> for String {
    fn from(scale: Scale) -> Self {
        scale.name().to_string()
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Snaps the value to the nearest pitch of the scale built on root, keeping the
/// result within the range. Equidistant scale degrees resolve to the lower one.
pub fn quantize(value: u8, root: u8, scale: Scale, range: NoteRange) -> u8 {
    let (min, max) = (i32::from(range.min), i32::from(range.max));
    let value = i32::from(value).min(max).max(min);

    let relative = value - i32::from(root);
    let octave = relative.div_euclid(12);
    let note_in_octave = relative.rem_euclid(12);

    let degrees = scale.intervals();
    let mut closest = degrees[0];
    let mut min_distance = (note_in_octave - closest).abs();
    for &degree in &degrees[1..] {
        let distance = (note_in_octave - degree).abs();
        if distance < min_distance {
            min_distance = distance;
            closest = degree;
        }
    }

    let quantized = i32::from(root) + octave * 12 + closest;
    quantized.min(max).max(min) as u8
}

/// Formats a MIDI note as a name with octave, e.g. 60 is C4.
pub fn note_name(note: u8) -> String {
    let octave = i32::from(note / 12) - 1;
    format!("{}{}", NOTE_NAMES[usize::from(note % 12)], octave)
}

/// Parses a note name with octave (C4, F#3, C-1) into a MIDI note.
pub fn parse_note(name: &str) -> Option<u8> {
    let split = name.find(|c: char| c.is_ascii_digit() || c == '-')?;
    let (pitch, octave) = name.split_at(split);
    let index = NOTE_NAMES
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(pitch))?;
    let octave: i32 = octave.parse().ok()?;

    u8::try_from((octave + 1) * 12 + index as i32)
        .ok()
        .filter(|note| *note <= 127)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NoteSpec {
    Number(u8),
    Name(String),
}

/// Deserializes an optional note given either as a number or as a note name.
pub(crate) fn deserialize_optional_note<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NoteSpec>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NoteSpec::Number(note)) if note <= 127 => Ok(Some(note)),
        Some(NoteSpec::Number(note)) => Err(de::Error::custom(format!(
            "note {} is out of range",
            note
        ))),
        Some(NoteSpec::Name(name)) => parse_note(&name)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("unknown note name {}", name))),
    }
}
