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

//! Construction and description of the channel messages samplers produce.
//! Channels are given as 1-16 throughout.

use std::error::Error;

use midly::{
    live::LiveEvent,
    num::{u4, u7},
    MidiMessage,
};

/// The "all notes off" channel mode controller.
pub const ALL_NOTES_OFF: u8 = 123;

fn channel_message(channel: u8, message: MidiMessage) -> LiveEvent<'static> {
    LiveEvent::Midi {
        channel: u4::from(channel.saturating_sub(1)),
        message,
    }
}

pub fn note_on(channel: u8, key: u8, velocity: u8) -> LiveEvent<'static> {
    channel_message(
        channel,
        MidiMessage::NoteOn {
            key: u7::from(key),
            vel: u7::from(velocity),
        },
    )
}

pub fn note_off(channel: u8, key: u8) -> LiveEvent<'static> {
    channel_message(
        channel,
        MidiMessage::NoteOff {
            key: u7::from(key),
            vel: u7::from(0),
        },
    )
}

pub fn control_change(channel: u8, controller: u8, value: u8) -> LiveEvent<'static> {
    channel_message(
        channel,
        MidiMessage::Controller {
            controller: u7::from(controller),
            value: u7::from(value),
        },
    )
}

pub fn program_change(channel: u8, program: u8) -> LiveEvent<'static> {
    channel_message(
        channel,
        MidiMessage::ProgramChange {
            program: u7::from(program),
        },
    )
}

pub fn all_notes_off(channel: u8) -> LiveEvent<'static> {
    control_change(channel, ALL_NOTES_OFF, 0)
}

/// Serializes the event to raw MIDI bytes.
pub fn to_bytes(event: &LiveEvent) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut buf: Vec<u8> = Vec::with_capacity(3);
    event.write(&mut buf)?;
    Ok(buf)
}

/// A short human readable description of the event for the MIDI log.
pub fn describe(event: &LiveEvent) -> String {
    let LiveEvent::Midi { channel, message } = event else {
        return format!("{:?}", event);
    };

    let channel = channel.as_int() + 1;
    match message {
        MidiMessage::NoteOn { key, vel } => format!(
            "Note On Ch{} Note{} Vel{}",
            channel,
            key.as_int(),
            vel.as_int()
        ),
        MidiMessage::NoteOff { key, .. } => {
            format!("Note Off Ch{} Note{}", channel, key.as_int())
        }
        MidiMessage::Controller { controller, value } => format!(
            "CC Ch{} CC{} Val{}",
            channel,
            controller.as_int(),
            value.as_int()
        ),
        MidiMessage::ProgramChange { program } => {
            format!("Prog Ch{} Prog{}", channel, program.as_int())
        }
        MidiMessage::PitchBend { bend } => {
            format!("Pitch Bend Ch{} Val{}", channel, bend.0.as_int())
        }
        other => format!("{:?} Ch{}", other, channel),
    }
}

/// Describes a raw message received on a MIDI input. A note on with velocity
/// zero is reported as a note off.
pub fn describe_incoming(raw: &[u8]) -> String {
    match LiveEvent::parse(raw) {
        Ok(LiveEvent::Midi {
            channel,
            message: MidiMessage::NoteOn { key, vel },
        }) if vel.as_int() == 0 => {
            format!("Note Off Ch{} Note{}", channel.as_int() + 1, key.as_int())
        }
        Ok(event) => describe(&event),
        Err(_) => format!("Unknown {:02X?}", raw),
    }
}
