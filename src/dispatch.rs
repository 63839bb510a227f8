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

//! Turns sampled values into MIDI messages: change gating, message layout per
//! sampler kind, and the note-on/note-off lifecycle.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use tracing::{debug, trace, warn};

use crate::link::{self, Link};
use crate::midi::message;
use crate::midilog::LogSource;
use crate::registry::Registry;
use crate::sampler::{CcTarget, NoteTarget, Sampler, SamplerId, SamplerKind};
use crate::scale;
use crate::session::Session;

/// The data byte used when an unlinked sampler's value fills the other role.
const FIXED_VALUE: u8 = 127;

/// The message a sampler produces for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outgoing {
    Note { key: u8, velocity: u8 },
    ControlChange { controller: u8, value: u8 },
    Program { program: u8 },
}

/// A note-off scheduled to be sent later. It carries everything needed to send
/// it, so it fires even if its sampler is reconfigured or deleted in the meantime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredNoteOff {
    pub due_at: u64,
    sequence: u64,
    pub sampler_id: SamplerId,
    pub channel: u8,
    pub note: u8,
    pub delay: u32,
}

impl Ord for DeferredNoteOff {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due_at, self.sequence).cmp(&(other.due_at, other.sequence))
    }
}

impl PartialOrd for DeferredNoteOff {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The value the sampler sends this sample, quantized when it selects a pitch.
pub fn sampled_value(sampler: &Sampler) -> u8 {
    let config = &sampler.config;
    if config.quantize_to_scale && config.kind.has_pitch_role() {
        scale::quantize(
            sampler.state.midi_value,
            config.scale_root,
            config.scale,
            config.note_range,
        )
    } else {
        sampler.state.midi_value
    }
}

/// Returns true if change gating holds the value back.
pub fn is_gated(sampler: &Sampler, value: u8, delta_threshold: u8) -> bool {
    sampler.config.send_on_change_only
        && sampler
            .state
            .last_sent_value
            .is_some_and(|last| last.abs_diff(value) < delta_threshold)
}

/// Lays out the message data bytes. The sampler's own value fills the role named
/// by its target; the other role comes from the link, or from the fixed settings.
pub fn build(sampler: &Sampler, value: u8, link: Option<Link>) -> Outgoing {
    let companion = link.map(|link| link.companion_value);
    match sampler.config.kind {
        SamplerKind::Note(target) => {
            let (key, velocity) = match (target, companion) {
                (NoteTarget::Note, Some(companion)) => (value, companion),
                (NoteTarget::Velocity, Some(companion)) => (companion, value),
                (NoteTarget::Note, None) => (value, FIXED_VALUE),
                (NoteTarget::Velocity, None) => (sampler.config.note_number, value),
            };
            Outgoing::Note { key, velocity }
        }
        SamplerKind::ControlChange(target) => {
            let (controller, value) = match (target, companion) {
                (CcTarget::Controller, Some(companion)) => (value, companion),
                (CcTarget::Value, Some(companion)) => (companion, value),
                (CcTarget::Controller, None) => (value, FIXED_VALUE),
                (CcTarget::Value, None) => (sampler.config.cc_number, value),
            };
            Outgoing::ControlChange { controller, value }
        }
        SamplerKind::Program => Outgoing::Program { program: value },
    }
}

/// Sends messages for samplers and owns the queue of deferred note-offs.
#[derive(Default)]
pub struct Dispatcher {
    pending: BinaryHeap<Reverse<DeferredNoteOff>>,
    next_sequence: u64,
}

impl Dispatcher {
    pub fn new() -> Dispatcher {
        Dispatcher::default()
    }

    /// Sends whatever the sampler's latest sample calls for.
    pub fn dispatch(
        &mut self,
        id: SamplerId,
        registry: &mut Registry,
        session: &mut Session,
        now: u64,
    ) {
        let Some(sampler) = registry.get(id) else {
            return;
        };
        if !session.has_output() {
            trace!(id, "No MIDI output, not sending.");
            return;
        }

        let value = sampled_value(sampler);
        if is_gated(sampler, value, session.globals().delta_threshold) {
            trace!(id, value, "Change below delta threshold, not sending.");
            return;
        }

        let link = link::resolve(registry, sampler);
        let outgoing = build(sampler, value, link);
        let channel = sampler.config.channel;
        let note_off_delay = sampler.config.note_off_delay;
        let release = match outgoing {
            Outgoing::Note { key, .. } if sampler.config.send_note_off => sampler
                .state
                .last_sent_note
                .filter(|previous| *previous != key),
            _ => None,
        };

        let Some(sampler) = registry.get_mut(id) else {
            return;
        };
        sampler.state.last_sent_value = Some(value);

        if let Some(previous) = release {
            self.release(id, channel, previous, note_off_delay, session, now);
        }

        let event = match outgoing {
            Outgoing::Note { key, velocity } => message::note_on(channel, key, velocity),
            Outgoing::ControlChange { controller, value } => {
                message::control_change(channel, controller, value)
            }
            Outgoing::Program { program } => message::program_change(channel, program),
        };
        let description = message::describe(&event);
        if !session.send(event) {
            return;
        }

        if let Outgoing::Note { key, .. } = outgoing {
            sampler.state.last_sent_note = Some(key);
        }
        match link {
            Some(link) => debug!(
                id,
                companion = link.companion_id,
                event = description,
                "Sent linked message."
            ),
            None => debug!(
                id,
                event = description,
                color = ?sampler.state.color,
                "Sent message."
            ),
        }
        session.record(now, LogSource::Sampler(id), description, value);
    }

    /// Sends a note-off for the previous note, now or after the delay.
    fn release(
        &mut self,
        id: SamplerId,
        channel: u8,
        note: u8,
        delay: u32,
        session: &mut Session,
        now: u64,
    ) {
        if delay == 0 {
            let event = message::note_off(channel, note);
            let description = message::describe(&event);
            if session.send(event) {
                session.record(now, LogSource::Sampler(id), description, 0);
            }
            return;
        }

        debug!(id, note, delay, "Scheduling note off.");
        self.pending.push(Reverse(DeferredNoteOff {
            due_at: now + u64::from(delay),
            sequence: self.next_sequence,
            sampler_id: id,
            channel,
            note,
            delay,
        }));
        self.next_sequence += 1;
    }

    /// Sends every deferred note-off that has come due, in due order.
    pub fn fire_due(&mut self, session: &mut Session, now: u64) -> usize {
        let mut fired = 0;
        while self
            .pending
            .peek()
            .is_some_and(|Reverse(next)| next.due_at <= now)
        {
            let Some(Reverse(note_off)) = self.pending.pop() else {
                break;
            };

            let event = message::note_off(note_off.channel, note_off.note);
            let description = format!(
                "{} (delayed {}ms)",
                message::describe(&event),
                note_off.delay
            );
            if session.send(event) {
                session.record(now, LogSource::Sampler(note_off.sampler_id), description, 0);
            }
            fired += 1;
        }
        fired
    }

    /// When the next deferred note-off is due.
    pub fn next_due_at(&self) -> Option<u64> {
        self.pending.peek().map(|Reverse(next)| next.due_at)
    }

    /// The number of deferred note-offs still waiting.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Sends all notes off on every channel, regardless of sampler state.
    pub fn all_notes_off(session: &mut Session, now: u64) -> usize {
        if !session.has_output() {
            return 0;
        }

        let mut sent = 0;
        for channel in 1..=16 {
            if session.send(message::all_notes_off(channel)) {
                sent += 1;
            }
        }
        if sent == 0 {
            warn!("Unable to send all notes off on any channel.");
            session.set_status("All notes off failed");
            return 0;
        }

        session.record(
            now,
            LogSource::System,
            "All Notes Off (All Channels)".to_string(),
            0,
        );
        session.set_status("All notes off sent");
        sent
    }
}
